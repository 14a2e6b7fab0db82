//! Navigation query command.
//!
//! Validates the position, makes sure a daemon is running (launching one if
//! needed), sends the query and prints the answer.

use console::style;

use crate::{
   Result,
   config::Config,
   launcher::Launcher,
   types::{Caller, Location, Position, QueryKind, QueryResult},
};

/// Per-invocation query flags
#[derive(Debug, Clone, Copy, Default)]
pub struct Options<'a> {
   pub scope: Option<&'a str>,
   pub tags:  Option<&'a str>,
   pub json:  bool,
}

/// Executes one query of `kind` at `position`.
pub async fn execute(
   cfg: &Config,
   addr: &str,
   kind: QueryKind,
   position: &str,
   options: Options<'_>,
) -> Result<()> {
   let location = location(position, options)?;

   let launcher = Launcher::new(addr, cfg.clone());
   let mut client = launcher.ensure_daemon().await?;
   let result = client.answer(kind, location).await?;

   if options.json {
      println!("{}", serde_json::to_string_pretty(&result)?);
   } else {
      for line in render(&result) {
         println!("{line}");
      }
   }
   Ok(())
}

/// Validates `position` and wraps it, verbatim, with the given options.
fn location(position: &str, options: Options<'_>) -> Result<Location> {
   position.parse::<Position>()?;
   let mut location = Location::new(position);
   if let Some(scope) = options.scope.filter(|s| !s.is_empty()) {
      location = location.with_scope(scope);
   }
   if let Some(tags) = options.tags.filter(|t| !t.is_empty()) {
      location = location.with_tags(tags);
   }
   Ok(location)
}

fn at(pos: &str, text: impl AsRef<str>) -> String {
   format!("{}: {}", style(pos).cyan(), text.as_ref())
}

fn callers(lines: &mut Vec<String>, callers: &[Caller]) {
   for c in callers {
      lines.push(format!("\t{}", at(&c.pos, format!("{} {}", c.desc, c.caller))));
   }
}

/// Human-readable lines for a query answer, one location per line.
pub fn render(result: &QueryResult) -> Vec<String> {
   let mut lines = Vec::new();
   match result {
      QueryResult::Definition(def) => {
         lines.push(at(&def.obj_pos, format!("defined here as {}", def.desc)));
      },
      QueryResult::Callees(r) => {
         lines.push(at(&r.pos, &r.desc));
         for callee in &r.callees {
            lines.push(format!("\t{}", at(&callee.pos, &callee.name)));
         }
      },
      QueryResult::Callers(r) => {
         if r.callers.is_empty() {
            lines.push(style("no callers").dim().to_string());
         }
         callers(&mut lines, &r.callers);
      },
      QueryResult::CallStack(r) => {
         lines.push(at(&r.pos, format!("found a call path from root to {}", r.target)));
         callers(&mut lines, &r.callers);
      },
      QueryResult::Describe(r) => {
         lines.push(at(&r.pos, &r.desc));
         if let Some(value) = &r.value {
            lines.push(at(&value.obj_pos, format!("{} of type {}", r.detail, value.ty)));
         }
         if let Some(ty) = &r.ty {
            lines.push(at(&ty.name_pos, format!("defined as {}", ty.ty)));
            for method in &ty.methods {
               lines.push(format!("\t{}", at(&method.pos, format!("method {}", method.name))));
            }
         }
         if let Some(package) = &r.package {
            lines.push(format!("package {}", style(&package.path).bold()));
            for member in &package.members {
               let text = format!("{} {} {}", member.kind, member.name, member.ty);
               lines.push(format!("\t{}", at(&member.pos, text)));
            }
         }
      },
      QueryResult::FreeVars(r) => {
         for var in &r.vars {
            lines.push(at(&var.pos, format!("{} {} {}", var.kind, var.reference, var.ty)));
         }
      },
      QueryResult::Implements(r) => {
         lines.push(at(&r.ty.pos, format!("{} type {}", r.ty.kind, r.ty.name)));
         for to in &r.to {
            lines.push(format!("\t{}", at(&to.pos, format!("implements {}", to.name))));
         }
         for from in r.from.iter().chain(&r.from_ptr) {
            let text = format!("is implemented by {} type {}", from.kind, from.name);
            lines.push(format!("\t{}", at(&from.pos, text)));
         }
      },
      QueryResult::Peers(r) => {
         lines.push(at(&r.pos, format!("this channel of type {} may be:", r.ty)));
         for (verb, positions) in [
            ("allocated here", &r.allocs),
            ("sent to here", &r.sends),
            ("received from here", &r.receives),
            ("closed here", &r.closes),
         ] {
            for pos in positions {
               lines.push(format!("\t{}", at(pos, verb)));
            }
         }
      },
      QueryResult::PointsTo(r) => {
         for entry in &r.entries {
            let text = format!("this {} may point to these objects:", entry.ty);
            lines.push(at(&entry.name_pos, text));
            for label in &entry.labels {
               lines.push(format!("\t{}", at(&label.pos, &label.desc)));
            }
         }
      },
      QueryResult::Referrers(r) => {
         lines.push(at(&r.obj_pos, format!("references to {}", r.desc)));
         for package in &r.packages {
            for reference in &package.refs {
               lines.push(at(&reference.pos, &reference.text));
            }
         }
      },
      QueryResult::What(r) => {
         for node in &r.enclosing {
            lines.push(format!("{}-{}: {}", node.start, node.end, node.desc));
         }
         lines.push(format!("modes: [{}]", r.modes.join(" ")));
         if !r.src_dir.is_empty() {
            lines.push(format!("srcdir: {}", r.src_dir));
         }
         if !r.import_path.is_empty() {
            lines.push(format!("import path: {}", r.import_path));
         }
      },
      QueryResult::WhichErrs(r) => {
         lines.push(at(&r.err_pos, "this error may point to these globals:"));
         for global in &r.globals {
            lines.push(format!("\t{global}"));
         }
         if !r.constants.is_empty() {
            lines.push(at(&r.err_pos, "this error may contain these constants:"));
            for constant in &r.constants {
               lines.push(format!("\t{constant}"));
            }
         }
         if !r.types.is_empty() {
            lines.push(at(&r.err_pos, "this error may contain these dynamic types:"));
            for ty in &r.types {
               lines.push(format!("\t{}", at(&ty.pos, &ty.ty)));
            }
         }
      },
   }
   lines
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::types::{Callers, Definition, Peers};

   fn plain(lines: Vec<String>) -> Vec<String> {
      lines
         .into_iter()
         .map(|l| console::strip_ansi_codes(&l).into_owned())
         .collect()
   }

   #[test]
   fn position_is_sent_as_typed() {
      let location = location("main.go:#0120", Options::default()).unwrap();
      assert_eq!(location.position, "main.go:#0120");
      assert_eq!(location.options, None);
   }

   #[test]
   fn flags_reach_the_location() {
      let options = Options { scope: Some("a,b"), tags: Some("linux"), json: false };
      let location = location("main.go:#1", options).unwrap();
      assert_eq!(location.scope(), Some("a,b"));
      assert_eq!(location.tags(), Some("linux"));
   }

   #[test]
   fn malformed_position_is_rejected_locally() {
      let err = location("main.go", Options::default()).unwrap_err();
      assert!(matches!(err, crate::Error::InvalidPosition(_)), "{err}");
   }

   #[test]
   fn definition_is_one_line() {
      let result = QueryResult::Definition(Definition {
         obj_pos: "lib.go:10:6".to_string(),
         desc:    "func lib.Open".to_string(),
      });
      assert_eq!(plain(render(&result)), ["lib.go:10:6: defined here as func lib.Open"]);
   }

   #[test]
   fn empty_callers_are_reported() {
      let result = QueryResult::Callers(Callers::default());
      assert_eq!(plain(render(&result)), ["no callers"]);
   }

   #[test]
   fn peers_list_every_operation() {
      let result = QueryResult::Peers(Peers {
         pos:      "c.go:3:2".to_string(),
         ty:       "chan int".to_string(),
         allocs:   vec!["c.go:1:1".to_string()],
         sends:    vec!["c.go:4:1".to_string(), "c.go:5:1".to_string()],
         receives: Vec::new(),
         closes:   vec!["c.go:9:1".to_string()],
      });
      let lines = plain(render(&result));
      assert_eq!(lines.len(), 5);
      assert_eq!(lines[2], "\tc.go:4:1: sent to here");
      assert_eq!(lines[4], "\tc.go:9:1: closed here");
   }
}
