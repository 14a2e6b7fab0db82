mod support;

use std::sync::Arc;

use god::{
   Error,
   engine::{EchoEngine, EngineError},
   error::CaptureError,
   server::Server,
   types::{Callers, Definition, Location, QueryKind, QueryResult},
};
use support::{ChattyEngine, FailingEngine, FixedEngine, RecordingEngine, SilentEngine};

fn server(engine: impl god::engine::AnalysisEngine + 'static) -> Server {
   Server::new(Arc::new(engine), "127.0.0.1:0")
}

#[tokio::test]
async fn definition_returns_exactly_what_the_engine_delivered() {
   let delivered = Definition {
      obj_pos: "lib.go:10:6".to_string(),
      desc:    "func lib.Open".to_string(),
   };
   let server = server(FixedEngine::new(delivered.clone()));

   let got = server
      .get_definition(Location::new("main.go:#120"))
      .await
      .unwrap();
   assert_eq!(got, delivered);
}

#[tokio::test]
async fn engine_error_is_returned_verbatim() {
   let failure = EngineError::NoIdentifier("main.go:#120".to_string());
   let server = server(FailingEngine(failure.clone()));

   let err = server
      .get_callers(Location::new("main.go:#120"))
      .await
      .unwrap_err();
   match err {
      Error::Engine(got) => assert_eq!(got, failure),
      other => panic!("expected engine error, got {other}"),
   }
}

#[tokio::test]
async fn mismatched_result_is_a_checked_error() {
   let server = server(FixedEngine::new(Callers::default()));

   let err = server
      .get_definition(Location::new("main.go:#120"))
      .await
      .unwrap_err();
   assert!(matches!(
      err,
      Error::Capture(CaptureError::Mismatch {
         expected: QueryKind::Definition,
         found:    QueryKind::Callers,
      })
   ));
   assert_eq!(err.code(), "result_mismatch");
}

#[tokio::test]
async fn missing_result_is_reported() {
   let err = server(SilentEngine)
      .get_describe(Location::new("main.go:#120"))
      .await
      .unwrap_err();
   assert!(matches!(err, Error::Capture(CaptureError::Missing { kind: QueryKind::Describe })));
}

#[tokio::test]
async fn duplicate_result_is_reported() {
   let err = server(ChattyEngine)
      .get_peers(Location::new("main.go:#120"))
      .await
      .unwrap_err();
   assert!(matches!(err, Error::Capture(CaptureError::Duplicate { count: 2, .. })));
}

#[tokio::test]
async fn every_kind_is_dispatched_to_its_handler() {
   let engine = Arc::new(RecordingEngine::default());
   let server = Server::new(engine.clone(), "127.0.0.1:0");

   for kind in QueryKind::ALL {
      let result = server
         .answer(kind, Location::new("pkg/a.go:#42").with_scope("pkg,cmd/tool"))
         .await
         .unwrap();
      assert_eq!(result.kind(), kind);
   }

   let seen = engine.seen();
   assert_eq!(seen.len(), QueryKind::ALL.len());
   for (seen, kind) in seen.iter().zip(QueryKind::ALL) {
      assert_eq!(seen.kind, kind);
      assert_eq!(seen.position, "pkg/a.go:#42");
      assert_eq!(seen.scope, ["pkg", "cmd/tool"]);
   }
}

#[tokio::test]
async fn invalid_position_comes_back_as_engine_error() {
   let err = server(EchoEngine::new())
      .get_what(Location::new("not-a-position"))
      .await
      .unwrap_err();
   assert!(matches!(err, Error::Engine(EngineError::InvalidPosition(_))));
   assert_eq!(err.code(), "engine");
}

#[tokio::test]
async fn typed_handlers_match_dynamic_answer() {
   let server = server(EchoEngine::new());
   let location = Location::new("main.go:#7").with_scope("main");

   let typed = server.get_call_stack(location.clone()).await.unwrap();
   let dynamic = server.answer(QueryKind::CallStack, location).await.unwrap();
   assert_eq!(QueryResult::CallStack(typed), dynamic);
}
