//! Native (Rust-implemented) functions exposed to Tansy code.

use crate::value::Value;
use crate::vm::Vm;
use std::time::Instant;

/// `clock()` returns seconds elapsed since the VM started, as an `f64`.
///
/// The reference interpreter calls the C standard library's `clock()`;
/// we use a monotonic `Instant` captured at VM startup instead, since
/// there's no equivalent portable wall-clock tick count in safe Rust.
pub fn clock(vm: &mut Vm, args: &[Value]) -> Result<Value, String> {
    if !args.is_empty() {
        return Err(format!("Expected 0 arguments but got {}.", args.len()));
    }
    Ok(Value::Number(vm.start_time().elapsed().as_secs_f64()))
}

pub(crate) fn startup_instant() -> Instant {
    Instant::now()
}
