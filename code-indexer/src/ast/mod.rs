pub mod generic_text;
pub mod interface;
pub mod javascript;
pub mod python;
pub mod router;
pub mod svelte;
