use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use resources::objects::{ClusterRecord, TlsConfig};

use crate::error::CredentialError;

/// Files holding one cluster's TLS material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CredentialPaths {
    pub fn all(&self) -> [&Path; 3] {
        [&self.ca, &self.cert, &self.key]
    }
}

impl From<&CredentialPaths> for TlsConfig {
    fn from(paths: &CredentialPaths) -> Self {
        TlsConfig {
            ca_file: paths.ca.display().to_string(),
            cert_file: paths.cert.display().to_string(),
            key_file: paths.key.display().to_string(),
        }
    }
}

/// Directory of `{cluster}-{ca|cert|key}.pem` files read by Prometheus.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    dir: PathBuf,
}

impl CertificateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn paths(&self, cluster: &str) -> CredentialPaths {
        CredentialPaths {
            ca: self.dir.join(format!("{}-ca.pem", cluster)),
            cert: self.dir.join(format!("{}-cert.pem", cluster)),
            key: self.dir.join(format!("{}-key.pem", cluster)),
        }
    }

    /// Decode and write the cluster's credentials, overwriting whatever was there.
    /// Nothing is written unless all three payloads decode.
    pub fn materialize(&self, record: &ClusterRecord) -> Result<CredentialPaths, CredentialError> {
        let [ca, cert, key] = decode(record)?;

        fs::create_dir_all(&self.dir).map_err(|source| CredentialError::Write {
            path: self.dir.to_owned(),
            source,
        })?;

        let paths = self.paths(&record.name);
        for (path, content) in paths.all().into_iter().zip([ca, cert, key]) {
            fs::write(path, content).map_err(|source| CredentialError::Write {
                path: path.to_owned(),
                source,
            })?;
        }
        Ok(paths)
    }

    /// Delete the credential files of a cluster that is gone.
    /// Missing files are not an error.
    pub fn remove(&self, cluster: &str) -> io::Result<()> {
        for path in self.paths(cluster).all() {
            match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {},
            }
        }
        Ok(())
    }
}

/// CA certificate, client certificate and client key of a cluster, decoded.
pub fn decode(record: &ClusterRecord) -> Result<[Vec<u8>; 3], CredentialError> {
    let decode = |field: &'static str, payload: &str| {
        base64::decode(payload.trim()).map_err(|source| CredentialError::Decode {
            cluster: record.name.to_owned(),
            field,
            source,
        })
    };
    Ok([
        decode("ca certificate", &record.auth.ca_cert)?,
        decode("client certificate", &record.auth.client_cert)?,
        decode("client key", &record.auth.client_key)?,
    ])
}
