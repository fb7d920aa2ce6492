//! services/api/src/adapters/docpack_zip.rs
//!
//! Stores `.docpack` bundles as zip archives.
//! It implements the `DocpackCodec` port from the `core` crate.

use document_generator_core::ports::{BundleMember, DocpackCodec, MemberSource, PortError, PortResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

fn unexpected(e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// A `DocpackCodec` backed by deflate-compressed zip archives.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipDocpackCodec;

impl DocpackCodec for ZipDocpackCodec {
    fn write_bundle(&self, output: &Path, members: &[BundleMember]) -> PortResult<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(unexpected)?;
        }
        let file = File::create(output).map_err(unexpected)?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for member in members {
            writer
                .start_file(member.name.as_str(), options)
                .map_err(unexpected)?;
            match &member.source {
                MemberSource::Bytes(bytes) => writer.write_all(bytes).map_err(unexpected)?,
                MemberSource::File(path) => {
                    let mut source = File::open(path).map_err(|e| {
                        PortError::NotFound(format!("{}: {}", path.display(), e))
                    })?;
                    io::copy(&mut source, &mut writer).map_err(unexpected)?;
                }
            }
        }

        writer.finish().map_err(unexpected)?;
        Ok(())
    }

    fn extract_bundle(&self, archive: &Path, destination: &Path) -> PortResult<()> {
        let file = File::open(archive)
            .map_err(|e| PortError::NotFound(format!("{}: {}", archive.display(), e)))?;
        let mut zip = ZipArchive::new(file).map_err(unexpected)?;
        zip.extract(destination).map_err(unexpected)
    }
}
