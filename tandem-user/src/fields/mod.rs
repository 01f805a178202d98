pub mod registry;
pub mod value;
pub mod validate;
pub mod export;

pub use registry::{FieldDef, FieldKind, FieldRegistry, RegistryError, SearchKind};
pub use validate::{ChoiceContext, FieldError, RawFieldInput, ValidationReport};
pub use value::{Address, FieldValue, MultiAddress};
