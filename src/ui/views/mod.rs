mod records;

pub use records::RecordsView;
