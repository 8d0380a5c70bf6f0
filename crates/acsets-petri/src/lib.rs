//! Petri nets as ACSets, and the MiraNet schema.
//!
//! `petri` holds the generic queries and arc constructors for any schema with
//! the `S`/`T`/`I`/`O` shape; `mira` fixes that shape with MIRA metadata
//! attributes and wraps an instance in `MiraNet`.

pub mod mira;
pub mod petri;

pub use mira::{
    mira_schema, shared_mira_schema, MiraError, MiraHandles, MiraNet, ObservableAttrs, SpeciesAttrs, TransitionAttrs,
};
pub use petri::{
    connect_input, connect_output, input_species, inputs_of, output_species, outputs_of,
    species_of_input, species_of_output, transition_of_input, transition_of_output,
    transitions_consuming, transitions_producing, PetriHandles,
};
