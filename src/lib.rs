pub mod codec;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod memory;
pub mod mime;
pub mod path;
pub mod protocol;
pub mod relay;
pub mod remote;
pub mod transport;
pub mod types;
pub mod usage;
pub mod webhdfs;

pub use codec::{ContentCodec, CsvTable, Preview};
pub use config::{AppConfig, ConnectionConfig, RelayEndpoint};
pub use dashboard::{Dashboard, OpenFile};
pub use error::{HdfsError, Result};
pub use memory::MemoryFs;
pub use path::HdfsPath;
pub use protocol::{TwoHopWrite, WriteState};
pub use remote::RemoteFs;
pub use transport::{DirectTransport, RelayedTransport, Transport};
pub use types::{EntryKind, FileContent, RemoteEntry, StorageSummary, UploadIntent};
pub use usage::{format_bytes, StorageAggregator};
pub use webhdfs::WebHdfsClient;
