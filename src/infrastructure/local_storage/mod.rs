pub mod csv_artifact_adapter;
