//! Implementation of the hash() builtin function.

use std::hash::{BuildHasher, Hasher};

use crate::{bytecode::Vm, exception_private::RunResult, types::ArgValues, value::Value};

/// Fixed seeds keep hashes stable across runs of the same build.
const SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

pub(super) fn builtin_hash(_vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let value = super::single(args);
    value.check_hashable()?;
    let state = ahash::RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3);
    let mut hasher = state.build_hasher();
    value.hash_into(&mut hasher);
    Ok(Value::Int(i64::from_ne_bytes(hasher.finish().to_ne_bytes())))
}
