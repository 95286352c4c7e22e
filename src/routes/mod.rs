mod health_check;
mod likes;
mod response;
mod subscriptions;
mod users;

pub use health_check::health_check;
pub use likes::{liked_videos, toggle_comment_like, toggle_tweet_like, toggle_video_like};
pub use response::{parse_id, ApiResponse};
pub use subscriptions::{channel_subscribers, subscribed_channels, toggle_subscription};
pub use users::{
    change_password, current_user, login, logout, refresh_token, register, update_account,
    update_avatar, update_cover_image, REFRESH_TOKEN_COOKIE,
};
