pub mod docpack_zip;
pub mod docx;
pub mod export;
pub mod generation_llm;

pub use docpack_zip::ZipDocpackCodec;
pub use docx::DocxTextExtractor;
pub use export::FileExporter;
pub use generation_llm::OpenAiGenerationAdapter;
