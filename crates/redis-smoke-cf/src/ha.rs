//! Sentinel status decoding and failover checks
//!
//! The sample app reports sentinel views of the master (`/master`) and
//! replicas (`/replicas`) as JSON objects with kebab-case keys and string
//! values, exactly as `SENTINEL MASTER` and `SENTINEL REPLICAS` return
//! them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Expected master name registered with sentinel
pub const MASTER_NAME: &str = "redis-master";

/// Sentinels, replicas and quorum of an HA deployment
pub const EXPECTED_OTHER_SENTINELS: &str = "2";
pub const EXPECTED_REPLICAS: usize = 2;
pub const EXPECTED_QUORUM: &str = "2";

/// HA check failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HaError {
    #[error("Failed to decode sentinel status: {0}")]
    Decode(String),

    #[error("master {field} is '{actual}', expected '{expected}'")]
    UnexpectedMaster {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("expected {expected} replicas, found {actual}")]
    ReplicaCount { expected: usize, actual: usize },

    #[error("replica {name}'s link to master is '{status}', not 'ok'")]
    ReplicaLinkDown { name: String, status: String },

    #[error("master did not change during failover ({field} is still '{value}')")]
    MasterUnchanged { field: &'static str, value: String },

    #[error("new master {ip} ({runid}) was not one of the previous replicas")]
    NewMasterNotAReplica { ip: String, runid: String },

    #[error("new master {field} is '{actual}' but the promoted replica had '{expected}'")]
    PromotedReplicaMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("old master {ip} ({runid}) did not rejoin as a replica")]
    OldMasterNotRejoined { ip: String, runid: String },

    #[error("rejoined replica {field} is '{actual}' but the old master had '{expected}'")]
    RejoinedReplicaMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },
}

/// Sentinel's view of the master
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RedisMasterInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub runid: String,
    #[serde(default)]
    pub role_reported: String,
    #[serde(default)]
    pub num_slaves: String,
    #[serde(default)]
    pub num_other_sentinels: String,
    #[serde(default)]
    pub quorum: String,
}

/// Sentinel's view of one replica
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RedisReplicaInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub runid: String,
    #[serde(default)]
    pub role_reported: String,
    #[serde(default)]
    pub master_host: String,
    #[serde(default)]
    pub master_port: String,
    #[serde(default)]
    pub master_link_status: String,
}

pub fn parse_master_info(body: &str) -> Result<RedisMasterInfo, HaError> {
    serde_json::from_str(body).map_err(|e| HaError::Decode(e.to_string()))
}

pub fn parse_replica_info(body: &str) -> Result<Vec<RedisReplicaInfo>, HaError> {
    serde_json::from_str(body).map_err(|e| HaError::Decode(e.to_string()))
}

/// Index of the replica with the given ip and run id
///
/// If several replicas match, the last one wins.
pub fn index_of_instance(replicas: &[RedisReplicaInfo], ip: &str, runid: &str) -> Option<usize> {
    replicas
        .iter()
        .rposition(|r| r.ip == ip && r.runid == runid)
}

fn expect_master_field(
    field: &'static str,
    actual: &str,
    expected: &str,
) -> Result<(), HaError> {
    if actual == expected {
        Ok(())
    } else {
        Err(HaError::UnexpectedMaster {
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Check the master is healthy and fully replicated
pub fn validate_master(master: &RedisMasterInfo) -> Result<(), HaError> {
    let expected_replicas = EXPECTED_REPLICAS.to_string();

    expect_master_field("name", &master.name, MASTER_NAME)?;
    expect_master_field("role-reported", &master.role_reported, "master")?;
    expect_master_field(
        "num-other-sentinels",
        &master.num_other_sentinels,
        EXPECTED_OTHER_SENTINELS,
    )?;
    expect_master_field("num-slaves", &master.num_slaves, &expected_replicas)?;
    expect_master_field("quorum", &master.quorum, EXPECTED_QUORUM)?;
    Ok(())
}

/// Check there are exactly two replicas and both are linked to the master
pub fn validate_replicas(replicas: &[RedisReplicaInfo]) -> Result<(), HaError> {
    if replicas.len() != EXPECTED_REPLICAS {
        return Err(HaError::ReplicaCount {
            expected: EXPECTED_REPLICAS,
            actual: replicas.len(),
        });
    }

    for replica in replicas {
        if replica.master_link_status != "ok" {
            return Err(HaError::ReplicaLinkDown {
                name: replica.name.clone(),
                status: replica.master_link_status.clone(),
            });
        }
    }
    Ok(())
}

/// Check a failover promoted a replica and demoted the old master
pub fn validate_failover(
    old_master: &RedisMasterInfo,
    new_master: &RedisMasterInfo,
    old_replicas: &[RedisReplicaInfo],
    new_replicas: &[RedisReplicaInfo],
) -> Result<(), HaError> {
    if new_master.ip == old_master.ip {
        return Err(HaError::MasterUnchanged {
            field: "ip",
            value: new_master.ip.clone(),
        });
    }
    if new_master.runid == old_master.runid {
        return Err(HaError::MasterUnchanged {
            field: "runid",
            value: new_master.runid.clone(),
        });
    }

    let promoted = index_of_instance(old_replicas, &new_master.ip, &new_master.runid)
        .map(|i| &old_replicas[i])
        .ok_or_else(|| HaError::NewMasterNotAReplica {
            ip: new_master.ip.clone(),
            runid: new_master.runid.clone(),
        })?;
    if new_master.port != promoted.port {
        return Err(HaError::PromotedReplicaMismatch {
            field: "port",
            expected: promoted.port.clone(),
            actual: new_master.port.clone(),
        });
    }

    let rejoined = index_of_instance(new_replicas, &old_master.ip, &old_master.runid)
        .map(|i| &new_replicas[i])
        .ok_or_else(|| HaError::OldMasterNotRejoined {
            ip: old_master.ip.clone(),
            runid: old_master.runid.clone(),
        })?;
    if rejoined.port != old_master.port {
        return Err(HaError::RejoinedReplicaMismatch {
            field: "port",
            expected: old_master.port.clone(),
            actual: rejoined.port.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(ip: &str, runid: &str) -> RedisMasterInfo {
        RedisMasterInfo {
            name: MASTER_NAME.into(),
            ip: ip.into(),
            port: "6379".into(),
            runid: runid.into(),
            role_reported: "master".into(),
            num_slaves: "2".into(),
            num_other_sentinels: "2".into(),
            quorum: "2".into(),
        }
    }

    fn replica(ip: &str, runid: &str) -> RedisReplicaInfo {
        RedisReplicaInfo {
            name: format!("{}:6379", ip),
            ip: ip.into(),
            port: "6379".into(),
            runid: runid.into(),
            role_reported: "slave".into(),
            master_host: "10.0.0.1".into(),
            master_port: "6379".into(),
            master_link_status: "ok".into(),
        }
    }

    #[test]
    fn test_parse_master_info_kebab_keys() {
        let body = r#"{
            "name": "redis-master", "ip": "10.0.0.1", "port": "6379",
            "runid": "abc", "flags": "master", "role-reported": "master",
            "num-slaves": "2", "num-other-sentinels": "2", "quorum": "2"
        }"#;

        let info = parse_master_info(body).unwrap();
        assert_eq!(info, master("10.0.0.1", "abc"));
    }

    #[test]
    fn test_parse_replica_info() {
        let body = r#"[
            {"name": "10.0.0.2:6379", "ip": "10.0.0.2", "port": "6379", "runid": "r2",
             "role-reported": "slave", "master-host": "10.0.0.1", "master-port": "6379",
             "master-link-status": "ok"},
            {"name": "10.0.0.3:6379", "ip": "10.0.0.3", "port": "6379", "runid": "r3",
             "role-reported": "slave", "master-host": "10.0.0.1", "master-port": "6379",
             "master-link-status": "err"}
        ]"#;

        let replicas = parse_replica_info(body).unwrap();
        assert_eq!(replicas.len(), 2);
        assert_eq!(replicas[0], replica("10.0.0.2", "r2"));
        assert_eq!(replicas[1].master_link_status, "err");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_master_info("key not present"),
            Err(HaError::Decode(_))
        ));
    }

    #[test]
    fn test_index_of_instance_last_match_wins() {
        let replicas = vec![
            replica("10.0.0.2", "r2"),
            replica("10.0.0.3", "r3"),
            replica("10.0.0.2", "r2"),
        ];

        assert_eq!(index_of_instance(&replicas, "10.0.0.2", "r2"), Some(2));
        assert_eq!(index_of_instance(&replicas, "10.0.0.3", "r3"), Some(1));
        assert_eq!(index_of_instance(&replicas, "10.0.0.3", "r2"), None);
        assert_eq!(index_of_instance(&[], "10.0.0.2", "r2"), None);
    }

    #[test]
    fn test_validate_master() {
        assert!(validate_master(&master("10.0.0.1", "abc")).is_ok());

        let mut degraded = master("10.0.0.1", "abc");
        degraded.num_slaves = "1".into();
        assert_eq!(
            validate_master(&degraded),
            Err(HaError::UnexpectedMaster {
                field: "num-slaves",
                expected: "2".into(),
                actual: "1".into(),
            })
        );
    }

    #[test]
    fn test_validate_replicas() {
        let healthy = vec![replica("10.0.0.2", "r2"), replica("10.0.0.3", "r3")];
        assert!(validate_replicas(&healthy).is_ok());

        assert_eq!(
            validate_replicas(&healthy[..1]),
            Err(HaError::ReplicaCount {
                expected: 2,
                actual: 1
            })
        );

        let mut broken = healthy.clone();
        broken[1].master_link_status = "err".into();
        assert!(matches!(
            validate_replicas(&broken),
            Err(HaError::ReplicaLinkDown { ref status, .. }) if status == "err"
        ));
    }

    #[test]
    fn test_validate_failover() {
        let old_master = master("10.0.0.1", "m1");
        let old_replicas = vec![replica("10.0.0.2", "r2"), replica("10.0.0.3", "r3")];
        let new_master = master("10.0.0.2", "r2");
        let new_replicas = vec![replica("10.0.0.3", "r3"), replica("10.0.0.1", "m1")];

        assert!(validate_failover(&old_master, &new_master, &old_replicas, &new_replicas).is_ok());
    }

    #[test]
    fn test_validate_failover_master_unchanged() {
        let old_master = master("10.0.0.1", "m1");
        let replicas = vec![replica("10.0.0.2", "r2"), replica("10.0.0.3", "r3")];

        assert!(matches!(
            validate_failover(&old_master, &old_master, &replicas, &replicas),
            Err(HaError::MasterUnchanged { field: "ip", .. })
        ));
    }

    #[test]
    fn test_validate_failover_promoted_unknown_instance() {
        let old_master = master("10.0.0.1", "m1");
        let old_replicas = vec![replica("10.0.0.2", "r2"), replica("10.0.0.3", "r3")];
        let new_master = master("10.0.0.9", "r9");

        assert!(matches!(
            validate_failover(&old_master, &new_master, &old_replicas, &old_replicas),
            Err(HaError::NewMasterNotAReplica { .. })
        ));
    }

    #[test]
    fn test_validate_failover_old_master_missing() {
        let old_master = master("10.0.0.1", "m1");
        let old_replicas = vec![replica("10.0.0.2", "r2"), replica("10.0.0.3", "r3")];
        let new_master = master("10.0.0.2", "r2");
        let new_replicas = vec![replica("10.0.0.3", "r3")];

        assert!(matches!(
            validate_failover(&old_master, &new_master, &old_replicas, &new_replicas),
            Err(HaError::OldMasterNotRejoined { .. })
        ));
    }
}
