//! Database entities.

pub mod comment;
pub mod following;
pub mod interaction_event;
pub mod post;
pub mod post_like;
pub mod post_metrics;
pub mod post_tag;
pub mod subscription;
pub mod user;

pub use comment::Entity as Comment;
pub use following::Entity as Following;
pub use interaction_event::Entity as InteractionEvent;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use post_metrics::Entity as PostMetrics;
pub use post_tag::Entity as PostTag;
pub use subscription::Entity as Subscription;
pub use user::Entity as User;
