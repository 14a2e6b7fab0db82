//! Translation of wire locations into engine queries.

use smallvec::SmallVec;

use crate::{
   Result,
   capture::ResultSink,
   types::{Location, Position, QueryResult},
};

/// Scope lists are usually a handful of packages.
pub type ScopeVec = SmallVec<[String; 4]>;

/// Engine-facing form of a [`Location`] for a single analysis run.
pub struct Query<'a> {
   position: String,
   scope:    ScopeVec,
   tags:     ScopeVec,
   output:   &'a dyn ResultSink,
}

impl Query<'_> {
   /// Position exactly as the client sent it.
   pub fn position(&self) -> &str {
      &self.position
   }

   pub fn parsed_position(&self) -> Result<Position> {
      self.position.parse()
   }

   /// Compilation units to restrict the analysis to; empty means no
   /// restriction.
   pub fn scope(&self) -> &[String] {
      &self.scope
   }

   pub fn is_scoped(&self) -> bool {
      !self.scope.is_empty()
   }

   /// Build tags in effect for this run.
   pub fn tags(&self) -> &[String] {
      &self.tags
   }

   /// Hands the analysis result to whoever issued this query.
   pub fn reply(&self, result: impl Into<QueryResult>) {
      self.output.deliver(result.into());
   }
}

/// Splits a comma-separated scope into trimmed, non-empty entries, keeping
/// their order.
pub fn split_scope(raw: &str) -> ScopeVec {
   raw.split(',')
      .map(str::trim)
      .filter(|entry| !entry.is_empty())
      .map(String::from)
      .collect()
}

/// Splits a build tag list; tags may be separated by spaces or commas.
pub fn split_tags(raw: &str) -> ScopeVec {
   raw.split(|c: char| c == ',' || c.is_whitespace())
      .filter(|tag| !tag.is_empty())
      .map(String::from)
      .collect()
}

/// Builds the query for `location`, wiring results into `output`.
pub fn build_query<'a>(location: &Location, output: &'a dyn ResultSink) -> Query<'a> {
   let scope = location.scope().map(split_scope).unwrap_or_default();
   let tags = location.tags().map(split_tags).unwrap_or_default();
   Query { position: location.position.clone(), scope, tags, output }
}

#[cfg(test)]
mod tests {
   use parking_lot::Mutex;

   use super::*;
   use crate::types::Definition;

   #[derive(Default)]
   struct Collect(Mutex<Vec<QueryResult>>);

   impl ResultSink for Collect {
      fn deliver(&self, result: QueryResult) {
         self.0.lock().push(result);
      }
   }

   #[test]
   fn scope_splits_in_order() {
      assert_eq!(split_scope("a,b,c").as_slice(), ["a", "b", "c"]);
   }

   #[test]
   fn empty_scope_is_unrestricted() {
      assert!(split_scope("").is_empty());
      let sink = Collect::default();
      let query = build_query(&Location::new("main.go:#1").with_scope(""), &sink);
      assert!(!query.is_scoped());
   }

   #[test]
   fn blank_entries_are_dropped() {
      assert_eq!(split_scope(" a, ,b,").as_slice(), ["a", "b"]);
      assert!(split_scope(",,").is_empty());
   }

   #[test]
   fn position_is_copied_verbatim() {
      let sink = Collect::default();
      let location = Location::new("pkg/main.go:#120").with_scope("pkg,pkg/sub");
      let query = build_query(&location, &sink);
      assert_eq!(query.position(), "pkg/main.go:#120");
      assert_eq!(query.scope(), ["pkg", "pkg/sub"]);
      assert_eq!(query.parsed_position().unwrap().offset, 120);
   }

   #[test]
   fn tags_split_on_spaces_and_commas() {
      assert_eq!(split_tags("linux  cgo,netgo").as_slice(), ["linux", "cgo", "netgo"]);
      let sink = Collect::default();
      let location = Location::new("a.go:#1").with_scope("a").with_tags("integration");
      let query = build_query(&location, &sink);
      assert_eq!(query.tags(), ["integration"]);
      assert_eq!(query.scope(), ["a"]);
      assert!(build_query(&Location::new("a.go:#1"), &sink).tags().is_empty());
   }

   #[test]
   fn reply_reaches_the_sink() {
      let sink = Collect::default();
      let query = build_query(&Location::new("a.go:#3"), &sink);
      query.reply(Definition { obj_pos: "a.go:1:1".into(), desc: "func a".into() });
      assert_eq!(sink.0.lock().len(), 1);
   }
}
