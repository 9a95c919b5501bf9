use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ledger::entities::ActivityRecord;

use super::{ActivityStorage, StorageError};

const RECORDS_FILE: &str = "activities.jsonl";

#[derive(Debug, Clone)]
enum Staged {
    Upsert(ActivityRecord),
    Remove(Uuid),
}

/// The main realization of [ActivityStorage]. Every record is a JSON document on its own line.
/// A commit reads the current file, applies staged changes and replaces the file as a whole.
pub struct JsonFileStorage {
    path: PathBuf,
    staged: Vec<Staged>,
}

impl JsonFileStorage {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self {
            path: record_dir.join(RECORDS_FILE),
            staged: vec![],
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_documents(path: &Path) -> Result<Vec<ActivityRecord>, std::io::Error> {
        fn extract(path: &Path) -> Result<Vec<ActivityRecord>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path)?;
            FileExt::lock_shared(&file)?;
            let reader = BufReader::new(&file);
            let mut records = vec![];
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ActivityRecord>(&line) {
                    Ok(v) => records.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &line
                        )
                    }
                }
            }
            FileExt::unlock(&file)?;
            Ok(records)
        }

        match extract(path) {
            Ok(records) => Ok(records),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    fn write_documents(&self, records: &BTreeMap<Uuid, ActivityRecord>) -> Result<(), StorageError> {
        let mut buffer = Vec::<u8>::new();
        for record in records.values() {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let temp_path = self.path.with_extension("jsonl.tmp");
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&buffer)?;
        temp.sync_all()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn commit_inner(&self) -> Result<(), StorageError> {
        let lock_file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))?;
        // Semi-safe acquire-release for the records file
        FileExt::lock_exclusive(&lock_file)?;
        let result = self.apply_staged();
        FileExt::unlock(&lock_file)?;
        result
    }

    fn apply_staged(&self) -> Result<(), StorageError> {
        let mut documents = Self::read_documents(&self.path)?
            .into_iter()
            .map(|record| (record.id, record))
            .collect::<BTreeMap<_, _>>();

        for change in &self.staged {
            match change {
                Staged::Upsert(record) => {
                    documents.insert(record.id, record.clone());
                }
                Staged::Remove(id) => {
                    documents.remove(id);
                }
            }
        }

        self.write_documents(&documents)
    }
}

impl ActivityStorage for JsonFileStorage {
    fn fetch_all(&mut self) -> Result<Vec<ActivityRecord>, StorageError> {
        let mut records = Self::read_documents(&self.path)?;
        records.sort_by(|a, b| b.day.cmp(&a.day).then_with(|| a.name.cmp(&b.name)));
        Ok(records)
    }

    fn insert(&mut self, record: &ActivityRecord) {
        self.staged.push(Staged::Upsert(record.clone()));
    }

    fn delete(&mut self, record: &ActivityRecord) {
        self.staged.push(Staged::Remove(record.id));
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        self.commit_inner()?;
        debug!("Committed {} staged changes", self.staged.len());
        self.staged.clear();
        Ok(())
    }
}
