//! Database repositories.

mod comment;
mod following;
mod interaction;
mod like;
mod post;
mod post_metrics;
mod subscription;
mod user;

pub use comment::CommentRepository;
pub use following::FollowingRepository;
pub use interaction::InteractionRepository;
pub use like::{CreatorLikes, LikeRepository};
pub use post::{PostRepository, TagUsage};
pub use post_metrics::PostMetricsRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;
