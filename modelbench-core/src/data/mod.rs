//! Dataset handling: sources, registry, preprocessing, splitting and ingestion.

pub mod ingest;
pub mod registry;
pub mod schema;
pub mod source;
pub mod split;
pub mod table;
pub mod transform;

pub use ingest::{DatasetPipeline, IngestReport};
pub use registry::{DatasetDescriptor, DatasetRegistry};
pub use schema::{ColumnType, SchemaDefinition};
pub use source::{CsvSource, DataSource};
pub use split::{SplitTables, train_test_split};
pub use table::DataBatch;
pub use transform::{PreprocessRegistry, TransformPipeline, TransformStep};
