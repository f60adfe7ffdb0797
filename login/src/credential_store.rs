use std::fs::OpenOptions;
use std::io::Write as _;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::Credentials;
use crate::Result;

/// Writes serialized credentials to `path`, readable only by the owner.
pub fn write_credentials_file(path: &Path, credentials: &Credentials) -> Result<()> {
    let mut options = OpenOptions::new();
    options.truncate(true).write(true).create(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(credentials.serialize().as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Reads a credentials file written by [`write_credentials_file`]. Returns
/// `Ok(None)` when the file does not exist.
pub fn read_credentials_file(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
