/// Data layer: raw tables, loading, and cleaning.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse first sheet → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  clean    │  select columns, coerce, drop incomplete rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  named numeric columns, no missing values
///   └──────────┘
/// ```

pub mod clean;
pub mod loader;
pub mod model;

pub use loader::{load_dataset, load_table};
pub use model::{Cell, Dataset, RawTable};
