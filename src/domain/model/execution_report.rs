use rust_decimal::Decimal;

/// FIX OrdStatus (tag 39) as reported by the counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    PendingNew,
    Undefined,
}

impl ExecStatus {
    pub fn from_fix(value: char) -> Self {
        match value {
            '0' => ExecStatus::New,
            '1' => ExecStatus::PartiallyFilled,
            '2' => ExecStatus::Filled,
            '4' => ExecStatus::Canceled,
            '8' => ExecStatus::Rejected,
            'A' => ExecStatus::PendingNew,
            _ => ExecStatus::Undefined,
        }
    }

    pub fn to_fix(self) -> char {
        match self {
            ExecStatus::New => '0',
            ExecStatus::PartiallyFilled => '1',
            ExecStatus::Filled => '2',
            ExecStatus::Canceled => '4',
            ExecStatus::Rejected => '8',
            ExecStatus::PendingNew => 'A',
            ExecStatus::Undefined => '*',
        }
    }
}

/// Immutable snapshot of exchange-reported order state. Correlation to a
/// strategy order is by `cl_ord_id`, except that `orig_cl_ord_id` takes
/// precedence when present (cancel acknowledgments carry the original id
/// there).
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    pub exchange_order_id: String,
    pub cl_ord_id: String,
    pub orig_cl_ord_id: Option<String>,
    pub status: ExecStatus,
    pub last_qty: Decimal,
    pub cum_qty: Decimal,
    pub leaves_qty: Decimal,
    pub transaction_time: i64,
    pub reject_reason: Option<String>,
    pub text: Option<String>,
}

impl ExecutionReport {
    /// Id under which the matching strategy order is resting.
    pub fn correlation_id(&self) -> &str {
        self.orig_cl_ord_id.as_deref().unwrap_or(&self.cl_ord_id)
    }
}
