//! The Urd elaborator.
//!
//! Turns a raw syntax tree ([`urd_ir::ast::RawFile`]) into an explicitly
//! typed program ([`tree::Decl`]): every binder annotated, every implicit
//! constructor, kind and disjointness argument made explicit, and every
//! class use replaced by the dictionary that satisfies it.
//!
//! # Architecture
//!
//! ```text
//! elaborate()
//!   └── Elaborator (driver)
//!       ├── per declaration group
//!       │   ├── con / expr / pat   bidirectional elaboration
//!       │   ├── solve              unification, disjointness and class
//!       │   │                      obligations through one queue
//!       │   └── finish             forcing, generalization, defaulting
//!       └── module                 structures, signatures, sealing,
//!                                  functors and their application
//! ```
//!
//! A failing declaration reports one error, binds its names to poison
//! (which unifies with everything) and elaboration continues with the
//! next declaration.
//!
//! # Usage
//!
//! ```ignore
//! use urd_elab::{elaborate, ElabConfig};
//!
//! let output = elaborate(&file, &interner, &ElabConfig::default());
//! for error in &output.errors {
//!     eprintln!("{}", error.code());
//! }
//! ```

mod con;
mod config;
mod decl;
mod driver;
mod env;
mod expr;
mod finish;
mod module;
mod pat;
mod solve;
pub mod tree;

use std::sync::Once;

use urd_ir::{ast::RawFile, Name, StringInterner};
use urd_types::{Def, ElabError, GlobalTable, Idx, NamedGlobals, Pool};

pub use config::ElabConfig;
pub use tree::Decl;

use driver::Elaborator;

/// Result of elaborating one file.
pub struct ElabOutput {
    pub decls: Vec<Decl>,
    pub errors: Vec<ElabError>,
    pub pool: Pool,
    pub globals: GlobalTable,
}

impl ElabOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Every error rendered on one line, in the order reported.
    pub fn render_errors(&mut self, interner: &StringInterner) -> Vec<String> {
        self.errors
            .iter()
            .map(|error| error.render(&mut self.pool, &self.globals, interner))
            .collect()
    }

    /// Render a constructor with global names spelled out.
    pub fn format_con(&mut self, idx: Idx, interner: &StringInterner) -> String {
        let names = NamedGlobals {
            globals: &self.globals,
            interner,
        };
        self.pool.format_with(idx, interner, &names)
    }

    /// Type of the value definition at `qualified`.
    pub fn val_type(&self, qualified: &[Name]) -> Option<Idx> {
        let id = self.globals.lookup_def(qualified)?;
        match self.globals.def(id).def {
            Def::Val { ty } => Some(ty),
            _ => None,
        }
    }
}

/// Elaborate a whole file.
#[tracing::instrument(level = "debug", skip_all, fields(decls = file.decls.len()))]
pub fn elaborate(file: &RawFile, interner: &StringInterner, config: &ElabConfig) -> ElabOutput {
    let mut elab = Elaborator::new(interner, config);
    let block = elab.elab_decls(&file.decls);
    elab.into_output(block.decls)
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `URD_LOG=urd_elab=debug` or `URD_LOG=urd_types=trace`; set
/// `URD_LOG_TREE` as well for indented, span-nested output.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if URD_LOG is set
        if std::env::var("URD_LOG").is_ok() {
            let filter = EnvFilter::from_env("URD_LOG");
            if std::env::var("URD_LOG_TREE").is_ok() {
                tracing_subscriber::registry()
                    .with(
                        tracing_tree::HierarchicalLayer::new(2)
                            .with_targets(true)
                            .with_bracketed_fields(true),
                    )
                    .with(filter)
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_target(true).with_level(true))
                    .with(filter)
                    .init();
            }
        }
    });
}
