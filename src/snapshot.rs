//! Snapshot files. Writing replaces the destination atomically, so readers only ever see a
//! complete snapshot. Also the checks and exports that run against a finished snapshot.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::{self, File, Permissions},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::safes::{Safe, Snapshot};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("safe {id} at index {index} does not sort after {previous}")]
    OutOfOrder {
        index: usize,
        previous: String,
        id: String,
    },
    #[error("trust from {user} to {can_send_to} has invalid limit percentage {limit_percentage}")]
    InvalidLimitPercentage {
        user: String,
        can_send_to: String,
        limit_percentage: String,
    },
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

/// A replaced snapshot keeps the mode of the file it replaces, a new one is world readable.
fn snapshot_permissions(path: &Path) -> Option<Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => default_permissions(),
    }
}

pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = snapshot_permissions(path);

    let mut builder = tempfile::Builder::new();
    if let Some(permissions) = &permissions {
        builder.permissions(permissions.clone());
    }
    let mut file = builder
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
    }
    // Creating the file applies the umask, setting the mode afterwards does not.
    if let Some(permissions) = permissions {
        file.as_file().set_permissions(permissions)?;
    }
    file.as_file().sync_all()?;
    debug!(temp_path = %file.path().display(), "wrote snapshot to temp file");

    file.persist(path)
        .with_context(|| format!("failed to move snapshot into {}", path.display()))?;

    info!(
        path = %path.display(),
        safes = snapshot.safes.len(),
        block_number = %snapshot.block_number,
        "wrote safes snapshot"
    );

    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    let snapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    Ok(snapshot)
}

/// Every id must sort strictly after the one before it, which also rules out duplicates.
pub fn check_ordering(safes: &[Safe]) -> Result<(), SnapshotError> {
    for (index, pair) in safes.windows(2).enumerate() {
        if pair[1].id <= pair[0].id {
            return Err(SnapshotError::OutOfOrder {
                index: index + 1,
                previous: pair[0].id.clone(),
                id: pair[1].id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub block_number: u64,
    pub safes: usize,
    pub organizations: usize,
    pub outgoing_permissions: usize,
    pub incoming_permissions: usize,
    pub balances: usize,
    pub tokens: usize,
}

impl SnapshotSummary {
    pub fn new(snapshot: &Snapshot) -> Self {
        let tokens: BTreeSet<&str> = snapshot
            .safes
            .iter()
            .flat_map(|safe| safe.balances.iter())
            .map(|balance| balance.token.id.as_str())
            .collect();

        Self {
            block_number: snapshot.block_number.number(),
            safes: snapshot.safes.len(),
            organizations: snapshot.safes.iter().filter(|s| s.organization).count(),
            outgoing_permissions: snapshot.safes.iter().map(|s| s.outgoing.len()).sum(),
            incoming_permissions: snapshot.safes.iter().map(|s| s.incoming.len()).sum(),
            balances: snapshot.safes.iter().map(|s| s.balances.len()).sum(),
            tokens: tokens.len(),
        }
    }
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block number:         {}", self.block_number)?;
        writeln!(f, "safes:                {}", self.safes)?;
        writeln!(f, "organizations:        {}", self.organizations)?;
        writeln!(f, "outgoing permissions: {}", self.outgoing_permissions)?;
        writeln!(f, "incoming permissions: {}", self.incoming_permissions)?;
        writeln!(f, "balances:             {}", self.balances)?;
        write!(f, "tokens:               {}", self.tokens)
    }
}

/// `user` trusts `can_send_to` up to `limit_percentage` of its holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustEdge {
    pub user: String,
    pub can_send_to: String,
    pub limit_percentage: u8,
}

/// Collects trust edges from both directions of every safe's permissions. Each edge shows up
/// on both of its safes, the map keeps one per pair.
pub fn trust_edges(snapshot: &Snapshot) -> Result<Vec<TrustEdge>, SnapshotError> {
    let mut edges: BTreeMap<(String, String), u8> = BTreeMap::new();

    let permissions = snapshot
        .safes
        .iter()
        .flat_map(|safe| safe.outgoing.iter().chain(safe.incoming.iter()));

    for permission in permissions {
        let user = permission.user_address.to_lowercase();
        let can_send_to = permission.can_send_to_address.to_lowercase();
        let limit_percentage = permission
            .limit_percentage
            .as_u64()
            .filter(|percentage| *percentage <= 100)
            .ok_or_else(|| SnapshotError::InvalidLimitPercentage {
                user: user.clone(),
                can_send_to: can_send_to.clone(),
                limit_percentage: permission.limit_percentage.to_string(),
            })? as u8;

        if user == ZERO_ADDRESS
            || can_send_to == ZERO_ADDRESS
            || user == can_send_to
            || limit_percentage == 0
        {
            continue;
        }

        edges.insert((user, can_send_to), limit_percentage);
    }

    Ok(edges
        .into_iter()
        .map(|((user, can_send_to), limit_percentage)| TrustEdge {
            user,
            can_send_to,
            limit_percentage,
        })
        .collect())
}

pub fn write_trust_edges_csv(path: &Path, edges: &[TrustEdge]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for edge in edges {
        writer.serialize(edge)?;
    }
    writer.flush()?;
    Ok(())
}
