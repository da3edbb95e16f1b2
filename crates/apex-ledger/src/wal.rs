use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use apex_types::Transaction;

use crate::error::LedgerError;

const DIGEST_LEN: usize = 32;

/// Appends one record to the WAL: `4-byte BE length | payload | 32-byte
/// SHA-256(payload)`, then forces the write to the medium before returning.
/// The durability protocol requires this to complete before the in-memory
/// delta is applied.
pub async fn append_record(path: &Path, tx: &Transaction) -> Result<(), LedgerError> {
    let payload = serde_json::to_vec(tx).map_err(|e| LedgerError::Persistence(e.to_string()))?;
    let digest = Sha256::digest(&payload);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| LedgerError::Persistence("WAL record exceeds u32 length".to_string()))?;

    file.write_all(&len.to_be_bytes())
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    file.write_all(&payload)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    file.write_all(&digest)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    file.sync_data()
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    Ok(())
}

/// Reads every record in the WAL in order, verifying each payload's trailing
/// digest. Returns the first digest mismatch as a `ReplayFailure` rather than
/// silently skipping it; a corrupt WAL must abort startup.
pub async fn read_all(path: &Path) -> Result<Vec<Transaction>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .open(path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    let mut records = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        match file.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(LedgerError::Persistence(e.to_string())),
        }
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)
            .await
            .map_err(|e| LedgerError::ReplayFailure(format!("truncated payload: {e}")))?;

        let mut digest_buf = [0u8; DIGEST_LEN];
        file.read_exact(&mut digest_buf)
            .await
            .map_err(|e| LedgerError::ReplayFailure(format!("truncated digest: {e}")))?;

        let expected = Sha256::digest(&payload);
        if expected.as_slice() != digest_buf {
            return Err(LedgerError::ReplayFailure(
                "WAL record digest mismatch".to_string(),
            ));
        }

        let tx: Transaction = serde_json::from_slice(&payload)
            .map_err(|e| LedgerError::ReplayFailure(format!("malformed record: {e}")))?;
        tx.verify_checksum()
            .map_err(|e| LedgerError::ReplayFailure(e.to_string()))?;
        records.push(tx);
    }

    Ok(records)
}

/// Truncates the WAL to empty. Called only after a snapshot has been
/// durably written; truncating before that would lose unsnapshotted records.
pub async fn truncate(path: &Path) -> Result<(), LedgerError> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_types::{AgentId, TransactionKind, TxId};
    use chrono::Utc;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction {
            tx_id: TxId::new(),
            timestamp: Utc::now(),
            from: AgentId::new("a").unwrap(),
            to: AgentId::new("b").unwrap(),
            amount: apex_types::Money::from_apx(5),
            kind: TransactionKind::Transfer,
            task_ref: None,
            checksum: String::new(),
        };
        tx.checksum = tx.compute_checksum().unwrap();
        tx
    }

    #[tokio::test]
    async fn appended_records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        let tx1 = sample_tx();
        let tx2 = sample_tx();

        append_record(&path, &tx1).await.unwrap();
        append_record(&path, &tx2).await.unwrap();

        let recovered = read_all(&path).await.unwrap();
        assert_eq!(recovered, vec![tx1, tx2]);
    }

    #[tokio::test]
    async fn detects_corrupted_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        append_record(&path, &sample_tx()).await.unwrap();

        let mut bytes = tokio::fs::read(&path).await.unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        tokio::fs::write(&path, bytes).await.unwrap();

        assert!(matches!(
            read_all(&path).await,
            Err(LedgerError::ReplayFailure(_))
        ));
    }

    #[tokio::test]
    async fn truncate_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.wal");
        append_record(&path, &sample_tx()).await.unwrap();
        truncate(&path).await.unwrap();
        assert!(read_all(&path).await.unwrap().is_empty());
    }
}
