//! Splice argument validation code into Perl sources.
//!
//! Sources mark where validation belongs with a trailing comment on a
//! lexical declaration:
//!
//! ```text
//! package Foo;
//! sub bar {
//!     my %args = @_;
//!     my $arg1 = $args{arg1}; # VALIDATE_ARG
//!     ...
//! }
//! ```
//!
//! [`process`] resolves `Foo`'s function metadata through a
//! [`MetadataStore`], compiles each argument's schema with a
//! [`SchemaCompiler`], and appends the generated checks to the tag's line
//! without changing the file's line count.

pub mod classify;
pub mod codegen;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod model;
pub mod schema;
pub mod squash;
pub mod tag;

pub use engine::{process, Outcome};
pub use error::{CompileError, FileError, GenerateError, MetadataError};
pub use metadata::{JsonMetadataStore, MemoryStore, MetadataStore};
pub use model::{Diagnostic, FunctionMetadata, MetadataIndex, Severity};
pub use schema::{PerlSchemaCompiler, SchemaCompiler};
