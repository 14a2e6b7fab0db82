//! Wire-level vocabulary shared by the client, the daemon and analysis
//! engines: positions, query kinds and the per-kind result shapes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Analysis requested by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
   Definition,
   Callees,
   Callers,
   CallStack,
   Describe,
   FreeVars,
   Implements,
   Peers,
   PointsTo,
   Referrers,
   What,
   WhichErrs,
}

impl QueryKind {
   pub const ALL: [Self; 12] = [
      Self::Definition,
      Self::Callees,
      Self::Callers,
      Self::CallStack,
      Self::Describe,
      Self::FreeVars,
      Self::Implements,
      Self::Peers,
      Self::PointsTo,
      Self::Referrers,
      Self::What,
      Self::WhichErrs,
   ];

   /// Mode name used on the command line and in logs.
   pub const fn as_str(self) -> &'static str {
      match self {
         Self::Definition => "definition",
         Self::Callees => "callees",
         Self::Callers => "callers",
         Self::CallStack => "callstack",
         Self::Describe => "describe",
         Self::FreeVars => "freevars",
         Self::Implements => "implements",
         Self::Peers => "peers",
         Self::PointsTo => "pointsto",
         Self::Referrers => "referrers",
         Self::What => "what",
         Self::WhichErrs => "whicherrs",
      }
   }
}

impl fmt::Display for QueryKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// Parsed `file:#offset` position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
   pub filename: String,
   pub offset:   u64,
}

impl FromStr for Position {
   type Err = Error;

   fn from_str(pos: &str) -> Result<Self, Self::Err> {
      let Some((filename, offset)) = pos.rsplit_once(":#") else {
         return Err(Error::InvalidPosition(pos.to_string()));
      };
      if filename.is_empty() {
         return Err(Error::InvalidPosition(pos.to_string()));
      }
      let offset = offset
         .parse::<u64>()
         .map_err(|_| Error::InvalidPosition(pos.to_string()))?;
      Ok(Self { filename: filename.to_string(), offset })
   }
}

impl fmt::Display for Position {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}:#{}", self.filename, self.offset)
   }
}

/// Per-query options sent along with a location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
   /// Comma-separated compilation units the analysis is limited to.
   pub scope: String,
   /// Build tags to apply when loading sources, space or comma separated.
   pub tags:  String,
}

/// Source position plus optional scope and build tags, as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
   pub position: String,
   pub options:  Option<QueryOptions>,
}

impl Location {
   pub fn new(position: impl Into<String>) -> Self {
      Self { position: position.into(), options: None }
   }

   pub fn from_parts(filename: &str, offset: u64) -> Self {
      Self::new(Position { filename: filename.to_string(), offset }.to_string())
   }

   pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
      self.options.get_or_insert_default().scope = scope.into();
      self
   }

   pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
      self.options.get_or_insert_default().tags = tags.into();
      self
   }

   /// Raw scope string, `None` when absent or empty.
   pub fn scope(&self) -> Option<&str> {
      self
         .options
         .as_ref()
         .map(|opts| opts.scope.as_str())
         .filter(|scope| !scope.is_empty())
   }

   /// Raw build tags, `None` when absent or empty.
   pub fn tags(&self) -> Option<&str> {
      self
         .options
         .as_ref()
         .map(|opts| opts.tags.as_str())
         .filter(|tags| !tags.is_empty())
   }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
   pub obj_pos: String,
   pub desc:    String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callee {
   pub name: String,
   pub pos:  String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callees {
   pub pos:     String,
   pub desc:    String,
   pub callees: Vec<Callee>,
}

/// One call site reaching the queried function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
   pub pos:    String,
   pub desc:   String,
   pub caller: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callers {
   pub callers: Vec<Caller>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStack {
   pub pos:     String,
   pub target:  String,
   pub callers: Vec<Caller>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeMethod {
   pub name: String,
   pub pos:  String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeMember {
   pub name:    String,
   pub ty:      String,
   pub value:   String,
   pub pos:     String,
   pub kind:    String,
   pub methods: Vec<DescribeMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribePackage {
   pub path:    String,
   pub members: Vec<DescribeMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeType {
   pub ty:       String,
   pub name_pos: String,
   pub methods:  Vec<DescribeMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeValue {
   pub ty:      String,
   pub value:   String,
   pub obj_pos: String,
}

/// Description of the syntax and, where applicable, the object at a position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Describe {
   pub desc:    String,
   pub pos:     String,
   pub detail:  String,
   pub package: Option<DescribePackage>,
   pub ty:      Option<DescribeType>,
   pub value:   Option<DescribeValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeVar {
   pub pos:       String,
   pub kind:      String,
   pub reference: String,
   pub ty:        String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeVars {
   pub vars: Vec<FreeVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementsType {
   pub name: String,
   pub pos:  String,
   pub kind: String,
}

/// Implementation relations of the type (or method) at a position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implements {
   pub ty:              ImplementsType,
   pub to:              Vec<ImplementsType>,
   pub from:            Vec<ImplementsType>,
   pub from_ptr:        Vec<ImplementsType>,
   pub method:          Option<DescribeMethod>,
   pub to_method:       Vec<DescribeMethod>,
   pub from_method:     Vec<DescribeMethod>,
   pub from_ptr_method: Vec<DescribeMethod>,
}

/// Channel operations that may alias the channel at a position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peers {
   pub pos:      String,
   pub ty:       String,
   pub allocs:   Vec<String>,
   pub sends:    Vec<String>,
   pub receives: Vec<String>,
   pub closes:   Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsToLabel {
   pub pos:  String,
   pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsToEntry {
   pub ty:       String,
   pub name_pos: String,
   pub labels:   Vec<PointsToLabel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTo {
   pub entries: Vec<PointsToEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
   pub pos:  String,
   pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrersPackage {
   pub package: String,
   pub refs:    Vec<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referrers {
   pub obj_pos:  String,
   pub desc:     String,
   pub packages: Vec<ReferrersPackage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
   pub desc:  String,
   pub start: u64,
   pub end:   u64,
}

/// Syntactic context of a position and the query modes valid there
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct What {
   pub enclosing:   Vec<SyntaxNode>,
   pub modes:       Vec<String>,
   pub src_dir:     String,
   pub import_path: String,
   pub object:      String,
   pub same_ids:    Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhichErrsType {
   pub ty:  String,
   pub pos: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhichErrs {
   pub err_pos:   String,
   pub globals:   Vec<String>,
   pub constants: Vec<String>,
   pub types:     Vec<WhichErrsType>,
}

/// Result delivered by an analysis engine, one variant per [`QueryKind`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
   Definition(Definition),
   Callees(Callees),
   Callers(Callers),
   CallStack(CallStack),
   Describe(Describe),
   FreeVars(FreeVars),
   Implements(Implements),
   Peers(Peers),
   PointsTo(PointsTo),
   Referrers(Referrers),
   What(What),
   WhichErrs(WhichErrs),
}

impl QueryResult {
   pub const fn kind(&self) -> QueryKind {
      match self {
         Self::Definition(_) => QueryKind::Definition,
         Self::Callees(_) => QueryKind::Callees,
         Self::Callers(_) => QueryKind::Callers,
         Self::CallStack(_) => QueryKind::CallStack,
         Self::Describe(_) => QueryKind::Describe,
         Self::FreeVars(_) => QueryKind::FreeVars,
         Self::Implements(_) => QueryKind::Implements,
         Self::Peers(_) => QueryKind::Peers,
         Self::PointsTo(_) => QueryKind::PointsTo,
         Self::Referrers(_) => QueryKind::Referrers,
         Self::What(_) => QueryKind::What,
         Self::WhichErrs(_) => QueryKind::WhichErrs,
      }
   }
}

/// A result shape statically tied to the query kind that produces it.
pub trait QueryOutput: Sized + Send + 'static {
   const KIND: QueryKind;

   /// Unwraps the matching variant, handing back the result untouched
   /// otherwise.
   fn from_result(result: QueryResult) -> Result<Self, QueryResult>;
}

macro_rules! query_outputs {
   ($($variant:ident),* $(,)?) => {
      $(
         impl QueryOutput for $variant {
            const KIND: QueryKind = QueryKind::$variant;

            fn from_result(result: QueryResult) -> Result<Self, QueryResult> {
               match result {
                  QueryResult::$variant(inner) => Ok(inner),
                  other => Err(other),
               }
            }
         }

         impl From<$variant> for QueryResult {
            fn from(value: $variant) -> Self {
               Self::$variant(value)
            }
         }
      )*
   };
}

query_outputs! {
   Definition,
   Callees,
   Callers,
   CallStack,
   Describe,
   FreeVars,
   Implements,
   Peers,
   PointsTo,
   Referrers,
   What,
   WhichErrs,
}
