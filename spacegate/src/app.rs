use spacegate_axum::{axum, AxumApp};
use spacegate_core::GateApp;

use crate::model::WorkspaceView;
use crate::services::GatewayParams;

pub fn gateway_app() -> AxumApp<WorkspaceView, GatewayParams> {
    let gate: GateApp<WorkspaceView, GatewayParams> = GateApp::new();
    axum(gate)
}
