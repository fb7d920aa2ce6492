pub mod convert;
pub mod docpack;
pub mod domain;
pub mod error;
pub mod outline;
pub mod ports;

pub use convert::{
    blocks_to_sections, build_outline, document_from_outline, BareSectionPolicy, ImportOptions,
    SectionTree,
};
pub use docpack::{pack_outline, unpack_outline};
pub use domain::{
    is_docx, read_resource_text, Block, BlockBody, BlockKind, Document, IndentDirection, Resource,
};
pub use error::{OutlineError, OutlineResult};
pub use outline::{Outline, ResourceEntry, Section, SectionKind};
pub use ports::{
    BundleMember, DocpackCodec, DocumentExporter, GenerationService, MemberSource, PlainTextOnly,
    PortError, PortResult, TextExtractor,
};
