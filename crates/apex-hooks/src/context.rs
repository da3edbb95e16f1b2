use std::sync::Arc;

use apex_ledger::Ledger;

/// Handles a hook may read from while evaluating a payload. Hooks receive
/// only a shared reference to the ledger — they can query balances and
/// records, but any financial *effect* goes through the ledger's own
/// `transfer` API from the handler, never from inside a hook: a hook is
/// pure with respect to ledger state.
#[derive(Clone)]
pub struct HookContext {
    pub ledger: Arc<Ledger>,
    pub token_tax_rate: f64,
}

impl HookContext {
    pub fn new(ledger: Arc<Ledger>, token_tax_rate: f64) -> Self {
        HookContext {
            ledger,
            token_tax_rate,
        }
    }
}
