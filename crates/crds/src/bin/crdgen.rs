//! Prints the operator's CRD manifests as YAML.
//!
//! Usage: `cargo run --bin crdgen > config/crds.yaml`

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&crds::MachinePool::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&crds::ClusterNetwork::crd())?);
    Ok(())
}
