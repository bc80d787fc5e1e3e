//! Fixture builders for archive and patch tests.

use std::io::Write;
use std::path::Path;

use crate::sig::Signature;
use crate::wharf::{PatchManifest, PatchOp, PATCH_MAGIC};

/// Write a zip archive with the given `(name, contents)` members.
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for (name, contents) in members {
        zip.start_file(name.to_string(), options).expect("start member");
        zip.write_all(contents).expect("write member");
    }
    zip.finish().expect("finish zip");
}

/// Write a tar.gz archive with the given `(name, contents)` members.
pub fn write_tar_gz(path: &Path, members: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create tar.gz");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut tar = tar::Builder::new(encoder);

    for (name, contents) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, name, *contents).expect("append member");
    }
    tar.into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

/// Write a patch container from a manifest and the payload blobs of its
/// add/replace operations, in operation order.
pub fn write_patch(path: &Path, manifest: &PatchManifest, blobs: &[&[u8]]) {
    let manifest_json = serde_json::to_vec(manifest).expect("serialize manifest");

    let mut out = Vec::new();
    out.extend_from_slice(PATCH_MAGIC);
    out.extend_from_slice(&(manifest_json.len() as u32).to_le_bytes());
    out.extend_from_slice(&manifest_json);
    for blob in blobs {
        out.extend_from_slice(blob);
    }

    std::fs::write(path, out).expect("write patch");
}

/// Build a patch manifest whose ops and signature describe `files` as the
/// complete target tree, all delivered as payload blobs.
pub fn full_patch_manifest(
    from_build: u64,
    to_build: u64,
    files: &[(&str, &[u8])],
) -> (PatchManifest, Vec<Vec<u8>>) {
    let mut ops = Vec::new();
    let mut blobs = Vec::new();
    let mut signature = Signature::new(format!("{to_build}"));

    for (name, contents) in files {
        let digest = crate::sig::sha256_hex(contents);
        ops.push(PatchOp::Add {
            path: name.to_string(),
            size: contents.len() as u64,
            sha256: digest.clone(),
        });
        signature.files.insert(name.to_string(), digest);
        blobs.push(contents.to_vec());
    }

    (
        PatchManifest {
            package: "game".to_string(),
            from_build,
            to_build,
            version: format!("{to_build}"),
            ops,
            signature,
        },
        blobs,
    )
}
