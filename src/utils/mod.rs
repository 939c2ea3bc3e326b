pub mod identity_index;
