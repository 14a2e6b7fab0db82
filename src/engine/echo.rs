//! Deterministic engine for tests and tooling.
//!
//! Answers every query kind by echoing the queried position back inside the
//! matching result shape. The daemon serves with it until a real analysis
//! backend is linked in.

use super::{AnalysisEngine, EngineError};
use crate::{
   query::Query,
   types::{
      CallStack, Callee, Callees, Caller, Callers, Definition, Describe, FreeVars, Implements,
      ImplementsType, Peers, PointsTo, QueryKind, QueryResult, Referrers, SyntaxNode, What,
      WhichErrs,
   },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoEngine;

impl EchoEngine {
   pub const fn new() -> Self {
      Self
   }
}

impl AnalysisEngine for EchoEngine {
   fn analyze(&self, kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError> {
      let parsed = query
         .parsed_position()
         .map_err(|_| EngineError::InvalidPosition(query.position().to_string()))?;
      let pos = query.position().to_string();
      let scope = if query.is_scoped() {
         format!(" in {}", query.scope().join(","))
      } else {
         String::new()
      };
      let tags = if query.tags().is_empty() {
         String::new()
      } else {
         format!(" with tags {}", query.tags().join(" "))
      };
      let desc = format!("{kind} at {pos}{scope}{tags}");

      let result: QueryResult = match kind {
         QueryKind::Definition => Definition { obj_pos: pos, desc }.into(),
         QueryKind::Callees => Callees {
            callees: vec![Callee { name: parsed.filename.clone(), pos: pos.clone() }],
            pos,
            desc,
         }
         .into(),
         QueryKind::Callers => Callers {
            callers: vec![Caller { pos, desc, caller: parsed.filename }],
         }
         .into(),
         QueryKind::CallStack => CallStack {
            target:  parsed.filename,
            callers: Vec::new(),
            pos,
         }
         .into(),
         QueryKind::Describe => Describe { desc, pos, ..Describe::default() }.into(),
         QueryKind::FreeVars => FreeVars::default().into(),
         QueryKind::Implements => Implements {
            ty: ImplementsType { name: desc, pos, kind: "type".to_string() },
            ..Implements::default()
         }
         .into(),
         QueryKind::Peers => Peers { pos, ..Peers::default() }.into(),
         QueryKind::PointsTo => PointsTo::default().into(),
         QueryKind::Referrers => Referrers { obj_pos: pos, desc, packages: Vec::new() }.into(),
         QueryKind::What => What {
            enclosing: vec![SyntaxNode { desc, start: parsed.offset, end: parsed.offset }],
            modes: QueryKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            ..What::default()
         }
         .into(),
         QueryKind::WhichErrs => WhichErrs { err_pos: pos, ..WhichErrs::default() }.into(),
      };

      query.reply(result);
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{capture::ResultCapture, query::build_query, types::Location};

   #[test]
   fn answers_every_kind_with_matching_variant() {
      let engine = EchoEngine::new();
      for kind in QueryKind::ALL {
         let capture = ResultCapture::new(kind);
         let location = Location::new("main.go:#120").with_scope("a,b");
         engine.analyze(kind, &build_query(&location, &capture)).unwrap();
         match kind {
            QueryKind::Definition => {
               let def: Definition = capture.take().unwrap();
               assert_eq!(def.obj_pos, "main.go:#120");
               assert!(def.desc.ends_with("in a,b"));
            },
            QueryKind::Peers => {
               let peers: Peers = capture.take().unwrap();
               assert_eq!(peers.pos, "main.go:#120");
            },
            _ => {},
         }
      }
   }

   #[test]
   fn build_tags_show_in_the_description() {
      let capture = ResultCapture::new(QueryKind::Definition);
      let location = Location::new("main.go:#1").with_tags("linux,cgo");
      EchoEngine::new()
         .analyze(QueryKind::Definition, &build_query(&location, &capture))
         .unwrap();
      let def: Definition = capture.take().unwrap();
      assert_eq!(def.desc, "definition at main.go:#1 with tags linux cgo");
   }

   #[test]
   fn malformed_position_is_an_engine_error() {
      let capture = ResultCapture::new(QueryKind::Definition);
      let location = Location::new("main.go");
      let err = EchoEngine::new()
         .analyze(QueryKind::Definition, &build_query(&location, &capture))
         .unwrap_err();
      assert_eq!(err, EngineError::InvalidPosition("main.go".to_string()));
   }
}
