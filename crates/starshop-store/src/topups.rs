//! Pending topup requests.
//!
//! Gateway topups live in memory, one per user; the gateway itself remembers
//! the invoice. Manual-transfer topups wait for an admin and are persisted.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use starshop_core::{
    BillingError, CodeBook, CodeKind, GatewayAsset, GatewayTopup, ManualTopup, RequestCode, Result,
    UserId,
};
use tracing::{debug, info};

use crate::document::{load_document, save_document, DocumentStore};
use crate::schema::doc;

/// Tracks gateway and manual topups and issues their codes.
pub struct TopupTracker {
    store: Arc<dyn DocumentStore>,
    gateway: HashMap<UserId, GatewayTopup>,
    manual: BTreeMap<RequestCode, ManualTopup>,
    codes: CodeBook,
}

impl TopupTracker {
    /// Load pending manual topups and seed the code book with their codes.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>) -> Self {
        let manual: BTreeMap<RequestCode, ManualTopup> =
            load_document(store.as_ref(), doc::MANUAL_TOPUPS).unwrap_or_default();

        let mut codes = CodeBook::new(CodeKind::Topup);
        codes.extend(manual.keys().cloned());

        Self {
            store,
            gateway: HashMap::new(),
            manual,
            codes,
        }
    }

    /// Mark codes found elsewhere (e.g. the journal) as used.
    pub fn seed_codes<I: IntoIterator<Item = RequestCode>>(&mut self, codes: I) {
        self.codes.extend(codes);
        debug!(kind = ?self.codes.kind(), known = self.codes.known(), "Seeded code book");
    }

    // ========================================================================
    // Gateway rail
    // ========================================================================

    /// Open a gateway topup, replacing any earlier one of the same user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts.
    pub fn open_gateway(
        &mut self,
        user_id: UserId,
        amount_minor: i64,
        asset: GatewayAsset,
    ) -> Result<GatewayTopup> {
        ensure_positive(amount_minor)?;
        let topup = GatewayTopup {
            code: self.codes.issue(),
            user_id,
            amount_minor,
            asset,
            invoice_ref: None,
            created_at: Utc::now(),
        };
        if let Some(previous) = self.gateway.insert(user_id, topup.clone()) {
            info!(user_id = %user_id, code = %previous.code, "Replaced pending gateway topup");
        }
        Ok(topup)
    }

    /// Remember the gateway's invoice id. Returns `false` if the topup is gone.
    pub fn attach_invoice(&mut self, user_id: UserId, code: &RequestCode, invoice_ref: String) -> bool {
        match self.gateway.get_mut(&user_id) {
            Some(topup) if &topup.code == code => {
                topup.invoice_ref = Some(invoice_ref);
                true
            }
            _ => false,
        }
    }

    /// The user's pending gateway topup.
    #[must_use]
    pub fn pending_gateway(&self, user_id: UserId) -> Option<&GatewayTopup> {
        self.gateway.get(&user_id)
    }

    /// Remove and return the user's gateway topup if it carries `code`.
    pub fn take_gateway(&mut self, user_id: UserId, code: &RequestCode) -> Option<GatewayTopup> {
        if self.gateway.get(&user_id).is_some_and(|topup| &topup.code == code) {
            return self.gateway.remove(&user_id);
        }
        None
    }

    // ========================================================================
    // Manual rail
    // ========================================================================

    /// Create a manual topup awaiting admin approval.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts.
    pub fn create_manual(&mut self, user_id: UserId, amount_minor: i64) -> Result<ManualTopup> {
        ensure_positive(amount_minor)?;
        let topup = ManualTopup::new(self.codes.issue(), user_id, amount_minor);
        self.manual.insert(topup.code.clone(), topup.clone());
        self.persist();

        info!(user_id = %user_id, code = %topup.code, amount_minor, "Manual topup requested");
        Ok(topup)
    }

    /// A pending manual topup.
    #[must_use]
    pub fn manual(&self, code: &RequestCode) -> Option<&ManualTopup> {
        self.manual.get(code)
    }

    /// All pending manual topups, ordered by code.
    pub fn pending_manual(&self) -> impl Iterator<Item = &ManualTopup> {
        self.manual.values()
    }

    /// Change the amount of a pending manual topup.
    ///
    /// Returns `None` if no such request is pending.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts.
    pub fn amend_manual(&mut self, code: &RequestCode, amount_minor: i64) -> Result<Option<ManualTopup>> {
        ensure_positive(amount_minor)?;
        let Some(topup) = self.manual.get_mut(code) else {
            return Ok(None);
        };
        topup.amend(amount_minor);
        let amended = topup.clone();
        self.persist();

        info!(code = %code, amount_minor, "Manual topup amended");
        Ok(Some(amended))
    }

    /// Remove a pending manual topup.
    pub fn take_manual(&mut self, code: &RequestCode) -> Option<ManualTopup> {
        let topup = self.manual.remove(code)?;
        self.persist();
        Some(topup)
    }

    /// Drop every pending manual topup for which `settled` holds.
    pub(crate) fn drop_manual_where<F>(&mut self, settled: F) -> Vec<RequestCode>
    where
        F: Fn(&ManualTopup) -> bool,
    {
        let dropped: Vec<RequestCode> = self
            .manual
            .values()
            .filter(|topup| settled(topup))
            .map(|topup| topup.code.clone())
            .collect();
        if !dropped.is_empty() {
            for code in &dropped {
                self.manual.remove(code);
            }
            self.persist();
        }
        dropped
    }

    fn persist(&self) -> bool {
        save_document(self.store.as_ref(), doc::MANUAL_TOPUPS, &self.manual)
    }
}

fn ensure_positive(amount_minor: i64) -> Result<()> {
    if amount_minor <= 0 {
        return Err(BillingError::InvalidAmount(format!(
            "topup amount must be positive, got {amount_minor}"
        )));
    }
    Ok(())
}
