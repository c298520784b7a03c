pub mod execution_provider;
pub mod input_resolution;
pub mod multi_pose_decoder;
pub mod onnx_pose_net;
pub mod onnx_pose_net_loader;
pub mod posenet_outputs;
pub mod single_pose_decoder;
