//! The ledger client trait.

use std::sync::Arc;

use async_trait::async_trait;
use cowallet_types::UserId;
use uuid::Uuid;

use crate::{
    error::Result,
    types::{Output, OutputQuery, SignedTransaction, SpendingRequest, TransactionDraft, TransactionRecord},
};

/// Operations the backend needs from the ledger.
///
/// Implementations own their timeouts. Absence is reported as
/// [`LedgerError::NotFound`](crate::LedgerError::NotFound).
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The service's own user id. Its single-member vault funds the outbox.
    fn client_id(&self) -> UserId;

    /// Lists outputs of a member set ordered by ascending sequence.
    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<Output>>;

    /// Resolves the request that signed or spent an output.
    async fn read_spending_request(&self, signer_ref: &str) -> Result<SpendingRequest>;

    /// Reads one output of a transaction.
    async fn read_output(&self, transaction_hash: &str, index: u8) -> Result<Output>;

    /// Reads a submitted transaction by its idempotency key.
    async fn read_transaction(&self, request_id: Uuid) -> Result<TransactionRecord>;

    /// Signs a draft with the service key.
    async fn sign_transaction(&self, draft: &TransactionDraft) -> Result<SignedTransaction>;

    /// Submits a signed transaction. Resubmitting a request id that was
    /// already accepted returns the original record and has no effect.
    async fn submit_transaction(
        &self,
        request_id: Uuid,
        transaction: &SignedTransaction,
    ) -> Result<TransactionRecord>;
}

#[async_trait]
impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn client_id(&self) -> UserId {
        (**self).client_id()
    }

    async fn list_outputs(&self, query: &OutputQuery) -> Result<Vec<Output>> {
        (**self).list_outputs(query).await
    }

    async fn read_spending_request(&self, signer_ref: &str) -> Result<SpendingRequest> {
        (**self).read_spending_request(signer_ref).await
    }

    async fn read_output(&self, transaction_hash: &str, index: u8) -> Result<Output> {
        (**self).read_output(transaction_hash, index).await
    }

    async fn read_transaction(&self, request_id: Uuid) -> Result<TransactionRecord> {
        (**self).read_transaction(request_id).await
    }

    async fn sign_transaction(&self, draft: &TransactionDraft) -> Result<SignedTransaction> {
        (**self).sign_transaction(draft).await
    }

    async fn submit_transaction(
        &self,
        request_id: Uuid,
        transaction: &SignedTransaction,
    ) -> Result<TransactionRecord> {
        (**self).submit_transaction(request_id, transaction).await
    }
}
