use core_types::{NodeEnvironment, NodeId};
use node_config::NodeConfig;
use services_messaging::HeaderProvider;

/// Who this node is, as stamped into outbound headers
#[derive(Debug, Clone, PartialEq)]
pub struct NodeIdentity {
    pub id: NodeId,
    pub name: String,
    pub environment: NodeEnvironment,
}

impl NodeIdentity {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            environment: config.environment(),
        }
    }
}

impl HeaderProvider for NodeIdentity {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn node_name(&self) -> String {
        self.name.clone()
    }

    fn environment(&self) -> NodeEnvironment {
        self.environment
    }
}
