pub mod argument;
pub mod document;
pub mod evidence;
pub mod patterns;
pub mod text;
