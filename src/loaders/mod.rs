/*
 * Binary Loaders
 *
 * This module provides support for loading different binary formats
 * into process address spaces.
 */

pub mod elf;

pub use elf::load_into;
