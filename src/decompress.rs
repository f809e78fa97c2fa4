use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};

use crate::{calendar::EphemerisFilename, error::Error};

/// Decompresses a gzip file next to itself (compression suffix stripped),
/// then deletes the compressed file.
///
/// The output is first written to a `.part` sibling and renamed once complete,
/// so the final path never holds truncated content. On failure, the
/// compressed file is left untouched.
pub fn decompress(compressed: &Path) -> Result<PathBuf, Error> {
    let decode_error = |source: io::Error| Error::Decode {
        path: compressed.to_path_buf(),
        source,
    };

    let target = compressed
        .to_str()
        .and_then(|s| s.strip_suffix(EphemerisFilename::GZIP_SUFFIX))
        .map(PathBuf::from)
        .ok_or_else(|| {
            decode_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a .gz file",
            ))
        })?;

    let mut partial = target.clone().into_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = inflate(compressed, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(decode_error(e));
    }

    fs::rename(&partial, &target).map_err(|e| {
        let _ = fs::remove_file(&partial);
        decode_error(e)
    })?;

    info!(
        "{} decompressed to {}",
        compressed.display(),
        target.display()
    );

    match fs::remove_file(compressed) {
        Ok(_) => debug!("deleted {}", compressed.display()),
        Err(e) => warn!("failed to delete {}: {}", compressed.display(), e),
    }

    Ok(target)
}

fn inflate(input: &Path, output: &Path) -> io::Result<u64> {
    let fd = File::open(input)?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(fd));

    let mut writer = BufWriter::new(File::create(output)?);
    let size = io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;

    debug!("{} - inflated {} bytes", input.display(), size);
    Ok(size)
}
