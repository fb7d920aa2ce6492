//! crates/document_generator_core/src/docpack.rs
//!
//! The logical contents of a `.docpack` bundle: an `outline.json` manifest plus
//! one member per bundled resource file, stored under `files/{key}/{file_name}`.
//! The container format itself belongs to a [`DocpackCodec`].

use crate::convert::confine_to;
use crate::domain::file_name_of;
use crate::error::{OutlineError, OutlineResult};
use crate::outline::Outline;
use crate::ports::{BundleMember, DocpackCodec, MemberSource};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DOCPACK_EXTENSION: &str = "docpack";
pub const MANIFEST_NAME: &str = "outline.json";
pub const FILES_DIR: &str = "files";

pub fn is_docpack(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCPACK_EXTENSION))
}

fn member_name(key: &str, file_name: &str) -> String {
    format!("{FILES_DIR}/{key}/{file_name}")
}

/// Lays out the members of a bundle for `outline`.
///
/// Every resource whose file exists is bundled and its manifest path rewritten
/// to the member name. Missing files keep their original path and are not
/// bundled. `is_inline` markers are stripped from the manifest.
pub fn bundle_members(outline: &Outline) -> OutlineResult<Vec<BundleMember>> {
    let mut manifest = outline.clone();
    manifest.strip_inline_markers();

    let mut members = Vec::new();
    for entry in &mut manifest.resources {
        if !entry.path.exists() {
            warn!(key = %entry.key, path = %entry.path.display(), "Resource file missing; not bundled");
            continue;
        }
        let resolved = entry.path.canonicalize()?;
        let name = member_name(&entry.key, &file_name_of(&resolved));
        members.push(BundleMember {
            name: name.clone(),
            source: MemberSource::File(resolved),
        });
        entry.path = PathBuf::from(name);
    }

    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
    members.insert(
        0,
        BundleMember {
            name: MANIFEST_NAME.to_string(),
            source: MemberSource::Bytes(manifest_bytes),
        },
    );
    Ok(members)
}

/// Writes `outline` and its resource files into a bundle at `output`.
pub fn pack_outline(outline: &Outline, codec: &dyn DocpackCodec, output: &Path) -> OutlineResult<()> {
    let members = bundle_members(outline)?;
    codec.write_bundle(output, &members)?;
    info!(
        output = %output.display(),
        files = members.len() - 1,
        "Docpack written"
    );
    Ok(())
}

/// Extracts a bundle into `destination` and returns its outline with every
/// resource pointing at its extracted copy.
///
/// Manifest paths must be bundle-relative and stay inside `destination`;
/// anything else fails with [`OutlineError::UnsafeResourcePath`].
pub fn unpack_outline(
    archive: &Path,
    codec: &dyn DocpackCodec,
    destination: &Path,
) -> OutlineResult<Outline> {
    fs::create_dir_all(destination)?;
    codec.extract_bundle(archive, destination)?;

    let manifest_path = destination.join(MANIFEST_NAME);
    let raw = fs::read_to_string(&manifest_path).map_err(|source| {
        OutlineError::UnreadableResourceFile {
            path: manifest_path.clone(),
            source,
        }
    })?;
    let mut outline = Outline::from_json(&raw)?;

    for entry in &mut outline.resources {
        if entry.path.has_root() {
            return Err(OutlineError::UnsafeResourcePath {
                path: entry.path.clone(),
            });
        }
        let local = confine_to(destination, &entry.path)?;
        if !local.exists() {
            warn!(key = %entry.key, path = %entry.path.display(), "Bundled resource missing from archive");
        }
        entry.path = local;
    }
    Ok(outline)
}
