//! Property-test harness; each module covers one subsystem.

mod interp_props;
mod synth_props;
