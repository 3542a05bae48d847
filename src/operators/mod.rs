//! The incremental operators (spec §4.3): each takes one or more
//! `Reactive` inputs and a stream of structural changes, and derives an
//! output `Reactive` whose own changes are computed from the input changes
//! alone — never by diffing full snapshots.
//!
//! Operator naming follows the container it specializes on: `_list` suffixes
//! operate on ordered sequences, `_map` suffixes on keyed mappings, `_log`
//! on append logs.

pub mod decompose;
pub mod map;
pub mod filter;
pub mod group_by;
pub mod join_map;
pub mod sequence_map;
pub mod supplemented;

pub use decompose::{compose_list, decompose_list};
pub use filter::filter_list;
pub use group_by::{group_by_list, group_by_map};
pub use join_map::join_map;
pub use map::{map_list, map_map};
pub use sequence_map::sequence_map;
pub use supplemented::{
    flatten_map, fold_log, get_key_map, get_single_map_value, length_log, map_log, map_primitive,
    project_tuple_0, project_tuple_1, sequence_list,
};
