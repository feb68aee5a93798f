// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document batches: SDF decoding and the add/delete pipeline.

mod pipeline;
mod record;
pub mod sdf;

pub use pipeline::{BatchPipeline, ExecutionReport, Operation, TranslatedCommand};
pub use record::{BatchMessage, BatchOutcome, BatchRecord, BatchStatus, DocumentId};
pub use sdf::{SdfError, SdfFormat};
