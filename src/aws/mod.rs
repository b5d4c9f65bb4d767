//! AWS 客户端模块
//!
//! 基于 reqwest 和 SigV4 签名实现 S3、SSM 与 Cloud Map 的最小客户端

pub mod cloudmap;
pub mod credentials;
pub mod s3;
pub mod session;
pub mod sigv4;
pub mod ssm;

// 重新导出主要类型
pub use cloudmap::CloudMapDiscovery;
pub use credentials::{Credentials, CredentialsProvider};
pub use s3::S3Client;
pub use session::AwsSession;
pub use ssm::SsmClient;
