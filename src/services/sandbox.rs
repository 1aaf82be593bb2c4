use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{AppError, Result};
use crate::models::{FileInfo, Listing, User};

/// A path inside one tenant's namespace
///
/// `segments` is the cleaned virtual path; `real` is always the tenant
/// root joined with those segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPath {
    tenant: String,
    segments: Vec<String>,
    real: PathBuf,
}

impl TenantPath {
    pub fn real(&self) -> &Path {
        &self.real
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Virtual path relative to the tenant root, `/`-separated
    pub fn relative(&self) -> String {
        self.segments.join("/")
    }

    /// Owner-prefixed form used as a share key
    pub fn namespaced(&self) -> String {
        if self.segments.is_empty() {
            self.tenant.clone()
        } else {
            format!("{}/{}", self.tenant, self.relative())
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether `self` is `other` or lies beneath it
    pub fn starts_with(&self, other: &TenantPath) -> bool {
        self.tenant == other.tenant && self.segments.starts_with(&other.segments)
    }

    fn parent(&self) -> Option<&Path> {
        if self.is_root() {
            None
        } else {
            self.real.parent()
        }
    }
}

/// How an existing entry should be relocated; rename and move never combine
#[derive(Debug, Clone)]
pub enum Relocation {
    /// Give the entry a new base name in the same directory
    Rename(String),
    /// Move the entry, keeping its name, into another existing directory
    Move(String),
}

/// A file resolved for download
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Upload staged outside every tenant tree
///
/// Bytes land in a temporary file under the storage root's staging
/// directory; only [`Upload::commit`] makes them visible under the final
/// name. Dropping an uncommitted upload removes the temporary file.
pub struct Upload {
    target: TenantPath,
    file: NamedTempFile,
    written: u64,
}

impl Upload {
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Publish the upload under its final name, refusing to replace anything
    pub fn commit(self) -> Result<FileInfo> {
        self.file.as_file().sync_all()?;

        let target = self.target;
        self.file
            .persist_noclobber(&target.real)
            .map_err(|e| match e.error.kind() {
                ErrorKind::AlreadyExists => AppError::PathAlreadyExists,
                _ => AppError::Io(e.error),
            })?;

        let metadata = fs::metadata(&target.real)?;
        Ok(FileInfo::from_metadata(
            target.file_name().unwrap_or_default(),
            &metadata,
        ))
    }
}

/// Tenant-scoped file operations under a storage root
#[derive(Debug, Clone)]
pub struct FileSandbox {
    root: PathBuf,
}

impl FileSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tenant_root(&self, tenant: &str) -> Result<PathBuf> {
        if !User::validate_username(tenant) {
            return Err(AppError::invalid("invalid tenant name"));
        }
        Ok(self.root.join(tenant))
    }

    /// Map a client-supplied path into the tenant's namespace
    ///
    /// Only normal components survive: `..`, `.`, roots and prefixes are
    /// dropped rather than interpreted, so the result never leaves the
    /// tenant root.
    pub fn resolve(&self, tenant: &str, virtual_path: &str) -> Result<TenantPath> {
        let tenant_root = self.tenant_root(tenant)?;

        let segments: Vec<String> = Path::new(virtual_path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if segments.iter().any(|s| s.contains('\0')) {
            return Err(AppError::invalid("path contains invalid characters"));
        }

        let mut real = tenant_root.clone();
        real.extend(&segments);

        if !real.starts_with(&tenant_root) {
            tracing::warn!("Rejected path outside tenant root for {}", tenant);
            return Err(AppError::forbidden("path escapes user root"));
        }

        Ok(TenantPath {
            tenant: tenant.to_string(),
            segments,
            real,
        })
    }

    // =========================================================================
    // Tenant lifecycle
    // =========================================================================

    pub fn create_tenant(&self, tenant: &str) -> Result<()> {
        let path = self.tenant_root(tenant)?;
        fs::create_dir_all(&self.root)?;
        match fs::create_dir(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AppError::PathAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a tenant's whole tree; a missing tree is not an error
    pub fn remove_tenant(&self, tenant: &str) -> Result<()> {
        let path = self.tenant_root(tenant)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn tenant_exists(&self, tenant: &str) -> Result<bool> {
        Ok(self.tenant_root(tenant)?.is_dir())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn metadata(&self, path: &TenantPath) -> Result<fs::Metadata> {
        fs::metadata(&path.real).map_err(not_found_as(AppError::PathNotFound))
    }

    /// Describe a file, or a directory together with its direct children
    pub fn list(&self, path: &TenantPath) -> Result<Listing> {
        let metadata = self.metadata(path)?;
        let name = path.file_name().unwrap_or("/");
        let entry = FileInfo::from_metadata(name, &metadata);

        if !metadata.is_dir() {
            return Ok(Listing {
                entry,
                root: path.is_root(),
                children: None,
            });
        }

        let mut children = Vec::new();
        for child in fs::read_dir(&path.real)? {
            let child = child?;
            let child_name = child.file_name().to_string_lossy().into_owned();
            let child_metadata = child.metadata()?;
            children.push(FileInfo::from_metadata(child_name, &child_metadata));
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Listing {
            entry,
            root: path.is_root(),
            children: Some(children),
        })
    }

    /// Start streaming a new file to `path`
    pub fn begin_upload(&self, path: &TenantPath) -> Result<Upload> {
        if path.is_root() || path.real.symlink_metadata().is_ok() {
            return Err(AppError::PathAlreadyExists);
        }

        let parent = path.parent().ok_or(AppError::PathNotFound)?;
        if !parent.is_dir() {
            return Err(AppError::PathNotFound);
        }

        // Same filesystem as the tenants, so commit is a rename
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        let file = tempfile::Builder::new()
            .prefix(UPLOAD_PREFIX)
            .tempfile_in(&staging)?;

        Ok(Upload {
            target: path.clone(),
            file,
            written: 0,
        })
    }

    /// Create a file from a reader; nothing is left behind if reading fails
    pub fn create_file<R: Read>(&self, path: &TenantPath, mut content: R) -> Result<FileInfo> {
        let mut upload = self.begin_upload(path)?;
        let mut buffer = vec![0u8; COPY_CHUNK_BYTES];
        loop {
            let read = match content.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            upload.write_chunk(&buffer[..read])?;
        }
        upload.commit()
    }

    pub fn create_directory(&self, path: &TenantPath) -> Result<FileInfo> {
        if path.real.symlink_metadata().is_ok() {
            return Err(AppError::PathAlreadyExists);
        }

        fs::create_dir(&path.real).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => AppError::PathAlreadyExists,
            ErrorKind::NotFound => AppError::PathNotFound,
            _ => AppError::Io(e),
        })?;

        let metadata = fs::metadata(&path.real)?;
        Ok(FileInfo::from_metadata(
            path.file_name().unwrap_or_default(),
            &metadata,
        ))
    }

    /// Rename or move an entry, returning its new location
    pub fn relocate(&self, path: &TenantPath, relocation: &Relocation) -> Result<TenantPath> {
        if path.is_root() {
            return Err(AppError::forbidden("not allowed to move user root"));
        }
        self.metadata(path)?;

        let destination = match relocation {
            Relocation::Rename(new_name) => {
                let name = base_name(new_name)
                    .ok_or_else(|| AppError::invalid("field 'filename' must be a file name"))?;
                let mut segments = path.segments.clone();
                if let Some(last) = segments.last_mut() {
                    *last = name;
                }
                self.resolve(&path.tenant, &segments.join("/"))?
            }
            Relocation::Move(new_parent) => {
                let parent = self.resolve(&path.tenant, new_parent)?;
                if !parent.real.is_dir() {
                    return Err(AppError::invalid("specified path does not exist"));
                }
                if parent.starts_with(path) {
                    return Err(AppError::invalid("cannot move a directory into itself"));
                }
                let name = path.file_name().unwrap_or_default();
                self.resolve(&path.tenant, &format!("{}/{}", parent.relative(), name))?
            }
        };

        if destination == *path {
            return Ok(destination);
        }
        rename_noclobber(&path.real, &destination.real)?;
        Ok(destination)
    }

    /// Remove a file, or a directory recursively
    pub fn delete(&self, path: &TenantPath) -> Result<()> {
        if path.is_root() {
            return Err(AppError::forbidden("not allowed to delete user root"));
        }

        let metadata = fs::symlink_metadata(&path.real).map_err(not_found_as(AppError::PathNotFound))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&path.real)?;
        } else {
            fs::remove_file(&path.real)?;
        }
        Ok(())
    }

    /// Resolve a file for streaming; directories cannot be downloaded
    pub fn download(&self, path: &TenantPath) -> Result<Download> {
        let metadata = self.metadata(path)?;
        if metadata.is_dir() {
            return Err(AppError::invalid("cannot download a directory"));
        }

        Ok(Download {
            path: path.real.clone(),
            name: path.file_name().unwrap_or_default().to_string(),
            size: metadata.len(),
        })
    }
}

/// Directory under the storage root holding in-flight uploads
///
/// Tenant names are alphanumeric, so it never collides with a tenant root.
const STAGING_DIR: &str = ".staging";

/// Prefix of temporary files holding in-flight uploads
const UPLOAD_PREFIX: &str = "upload-";

/// Read size used when copying from a reader
const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Move `from` to `to`, refusing to replace an existing entry
///
/// Files are hard linked then unlinked, so an existing name fails the link
/// itself. Directories cannot be linked; for them a create racing between
/// the existence check and the rename can still be replaced.
fn rename_noclobber(from: &Path, to: &Path) -> Result<()> {
    if fs::symlink_metadata(from)?.is_dir() {
        if to.symlink_metadata().is_ok() {
            return Err(AppError::PathAlreadyExists);
        }
        fs::rename(from, to)?;
        return Ok(());
    }

    fs::hard_link(from, to).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => AppError::PathAlreadyExists,
        _ => AppError::Io(e),
    })?;
    fs::remove_file(from)?;
    Ok(())
}

/// Last normal component of a client-supplied name
pub fn base_name(name: &str) -> Option<String> {
    Path::new(name).components().rev().find_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    })
}

fn not_found_as(error: AppError) -> impl FnOnce(io::Error) -> AppError {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            error
        } else {
            AppError::Io(e)
        }
    }
}
