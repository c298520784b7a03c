pub mod body_part;
pub mod pose;
pub mod pose_net;
