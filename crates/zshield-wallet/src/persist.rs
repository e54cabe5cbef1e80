//! Binary persistence of tracker state.
//!
//! Layout, all integers little-endian:
//! - format version (`u8`)
//! - tip height (optional `u32`)
//! - commitment tree
//! - undo history: count (`u32`), then per block its height (`u32`), prior
//!   tip (optional `u32`) and the tree before it, newest first
//! - notes: count (`u32`), then per note its txid, output index (`u32`),
//!   discovery height (`u32`), witness count (`u32`) and witnesses, newest
//!   first
//!
//! Optional values are a presence byte (`0` or `1`) followed by the value.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};
use zshield_tree::{IncrementalMerkleTree, IncrementalWitness, TreeNode};

use crate::error::TrackerError;
use crate::tracker::{BlockUndo, CommitmentTracker, NoteId, WITNESS_CACHE_SIZE, WitnessCache};

const FORMAT_VERSION: u8 = 1;

impl<H: TreeNode, const DEPTH: u8> CommitmentTracker<H, DEPTH> {
    /// Serialize the tracker.
    ///
    /// # Errors
    /// Propagates errors from `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&[FORMAT_VERSION])?;
        write_optional_u32(&mut writer, self.tip)?;
        self.tree.write(&mut writer)?;

        write_count(&mut writer, self.history.len())?;
        for undo in &self.history {
            writer.write_all(&undo.height.to_le_bytes())?;
            write_optional_u32(&mut writer, undo.prior_tip)?;
            undo.tree.write(&mut writer)?;
        }

        write_count(&mut writer, self.notes.len())?;
        for (id, cache) in &self.notes {
            writer.write_all(&id.txid)?;
            writer.write_all(&id.output_index.to_le_bytes())?;
            writer.write_all(&cache.discovered_at().to_le_bytes())?;
            write_count(&mut writer, cache.len())?;
            for witness in cache.iter() {
                witness.write(&mut writer)?;
            }
        }
        Ok(())
    }

    /// Deserialize a tracker written by [`CommitmentTracker::write`].
    ///
    /// # Errors
    /// - [`TrackerError::Corrupt`] on an unknown version, a count above its
    ///   limit, or undo history that does not end at the tip.
    /// - [`TrackerError::Tree`] if a tree or witness fails to decode.
    /// - [`TrackerError::Io`] on a truncated stream.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, TrackerError> {
        let mut version = [0_u8; 1];
        reader.read_exact(&mut version)?;
        if version != [FORMAT_VERSION] {
            return Err(TrackerError::Corrupt("unsupported format version"));
        }

        let tip = read_optional_u32(&mut reader)?;
        let tree = IncrementalMerkleTree::read(&mut reader)?;

        let history_len = read_count(&mut reader, WITNESS_CACHE_SIZE)?;
        let mut history = VecDeque::with_capacity(history_len);
        for _ in 0..history_len {
            let height = read_u32(&mut reader)?;
            let prior_tip = read_optional_u32(&mut reader)?;
            let tree = IncrementalMerkleTree::read(&mut reader)?;
            history.push_back(BlockUndo {
                height,
                prior_tip,
                tree,
            });
        }
        if history.front().is_some_and(|undo| Some(undo.height) != tip) {
            return Err(TrackerError::Corrupt("undo history does not end at the tip"));
        }

        let note_count = read_count(&mut reader, usize::MAX)?;
        let mut notes = BTreeMap::new();
        for _ in 0..note_count {
            let mut txid = [0_u8; 32];
            reader.read_exact(&mut txid)?;
            let id = NoteId::new(txid, read_u32(&mut reader)?);
            let discovered_at = read_u32(&mut reader)?;

            let witness_count = read_count(&mut reader, WITNESS_CACHE_SIZE.saturating_add(1))?;
            let witnesses = (0..witness_count)
                .map(|_| IncrementalWitness::read(&mut reader))
                .collect::<Result<VecDeque<_>, _>>()?;

            if notes
                .insert(id, WitnessCache::from_parts(discovered_at, witnesses)?)
                .is_some()
            {
                return Err(TrackerError::DuplicateNote(id));
            }
        }

        Ok(Self {
            tree,
            tip,
            history,
            notes,
        })
    }

    /// Write the tracker to `path`, replacing any existing file.
    ///
    /// # Errors
    /// [`TrackerError::Io`] if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<(), TrackerError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), notes = self.notes.len(), "Saved tracker state");
        Ok(())
    }

    /// Load a tracker from `path`.
    ///
    /// # Errors
    /// See [`CommitmentTracker::read`].
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let tracker = Self::read(BufReader::new(File::open(path)?))?;
        debug!(
            path = %path.display(),
            tip = ?tracker.tip,
            notes = tracker.notes.len(),
            "Loaded tracker state"
        );
        Ok(tracker)
    }
}

fn write_count<W: Write>(writer: &mut W, count: usize) -> io::Result<()> {
    let count = u32::try_from(count)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "count exceeds u32"))?;
    writer.write_all(&count.to_le_bytes())
}

fn read_count<R: Read>(reader: &mut R, limit: usize) -> Result<usize, TrackerError> {
    usize::try_from(read_u32(reader)?)
        .ok()
        .filter(|count| *count <= limit)
        .ok_or(TrackerError::Corrupt("count out of range"))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_optional_u32<W: Write>(writer: &mut W, value: Option<u32>) -> io::Result<()> {
    match value {
        None => writer.write_all(&[0]),
        Some(value) => {
            writer.write_all(&[1])?;
            writer.write_all(&value.to_le_bytes())
        }
    }
}

fn read_optional_u32<R: Read>(reader: &mut R) -> Result<Option<u32>, TrackerError> {
    let mut flag = [0_u8; 1];
    reader.read_exact(&mut flag)?;
    match flag {
        [0] => Ok(None),
        [1] => Ok(Some(read_u32(reader)?)),
        _ => Err(TrackerError::Corrupt("invalid optional flag")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::indexing_slicing, reason = "Tests")]

    use test_utils::{TestNode, leaf};

    use super::*;
    use crate::tracker::BlockCommitment;

    type Tracker = CommitmentTracker<TestNode, 8>;

    fn sample() -> Tracker {
        let mut tracker = Tracker::new();
        let note = |n: u8| NoteId::new([n; 32], 0);
        tracker
            .connect_block(
                100,
                &[
                    BlockCommitment::foreign(leaf!("a")),
                    BlockCommitment::owned(leaf!("b"), note(1)),
                ],
            )
            .expect("connect");
        tracker
            .connect_block(101, &[BlockCommitment::owned(leaf!("c"), note(2))])
            .expect("connect");
        tracker
            .connect_block(102, &[BlockCommitment::foreign(leaf!("d"))])
            .expect("connect");
        tracker
    }

    fn to_bytes(tracker: &Tracker) -> Vec<u8> {
        let mut bytes = Vec::new();
        tracker.write(&mut bytes).expect("write to vec");
        bytes
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let tracker = sample();
        let decoded = Tracker::read(to_bytes(&tracker).as_slice()).expect("valid");
        assert_eq!(decoded, tracker);
    }

    #[test]
    fn empty_tracker_roundtrip() {
        let tracker = Tracker::new();
        let bytes = to_bytes(&tracker);
        // version, absent tip, empty tree (two absent slots, no parents), two zero counts
        assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(Tracker::read(bytes.as_slice()).expect("valid"), tracker);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = to_bytes(&sample());
        bytes[0] = 2;
        assert!(matches!(
            Tracker::read(bytes.as_slice()),
            Err(TrackerError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = to_bytes(&sample());
        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(
            Tracker::read(truncated),
            Err(TrackerError::Io(_) | TrackerError::Tree(_))
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tracker.bin");

        let tracker = sample();
        tracker.save(&path).expect("save");
        let mut loaded = Tracker::load(&path).expect("load");
        assert_eq!(loaded, tracker);

        // The loaded state keeps its undo history.
        assert_eq!(loaded.disconnect_block().expect("history"), 102);
        assert_eq!(loaded.tip_height(), Some(101));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            Tracker::load(&dir.path().join("absent.bin")),
            Err(TrackerError::Io(_))
        ));
    }
}
