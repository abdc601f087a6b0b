pub mod record_store;

pub use record_store::{
    create_shared_record_store, RecordStore, SharedRecordStore, VerificationRecord,
};
