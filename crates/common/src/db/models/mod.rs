//! SeaORM entity models
//!
//! Database entities for the Roost back office

mod bedroom;
mod invoice;
mod lease;
mod ledger_entry;
mod property;
mod unit;
mod user;

pub use property::{
    Entity as PropertyEntity,
    Model as Property,
    ActiveModel as PropertyActiveModel,
    Column as PropertyColumn,
};

pub use unit::{
    Entity as UnitEntity,
    Model as Unit,
    ActiveModel as UnitActiveModel,
    Column as UnitColumn,
    RentalMode,
    UnitStatus,
};

pub use bedroom::{
    Entity as BedroomEntity,
    Model as Bedroom,
    ActiveModel as BedroomActiveModel,
    Column as BedroomColumn,
    BedroomStatus,
};

pub use lease::{
    Entity as LeaseEntity,
    Model as Lease,
    ActiveModel as LeaseActiveModel,
    Column as LeaseColumn,
    LeaseStatus,
};

pub use invoice::{
    Entity as InvoiceEntity,
    Model as Invoice,
    ActiveModel as InvoiceActiveModel,
    Column as InvoiceColumn,
    InvoiceStatus,
};

pub use ledger_entry::{
    Entity as LedgerEntryEntity,
    Model as LedgerEntry,
    ActiveModel as LedgerEntryActiveModel,
    Column as LedgerEntryColumn,
    EntryKind,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    UserRole,
};
