use super::value::Value;
use super::{Result, ScriptError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four host-callable operations exposed to scripts.
///
/// Calling one of these is the only way a script suspends: the interpreter
/// emits a [`HostCall`], the thread manager correlates it with a request ID,
/// and the thread stays suspended until the game world answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostApi {
    /// `moveTo(position)` — walk the agent to a world position.
    MoveTo,
    /// `use()` / `use(position)` — interact with the targeted object.
    Use,
    /// `jump()` — hop in place.
    Jump,
    /// `getNearestVoxels(ids)` — query the closest matching voxel, answered
    /// with a `{ position, flag }` map.
    GetNearestVoxels,
}

impl HostApi {
    /// Resolve a script-side function name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "moveTo" => Some(HostApi::MoveTo),
            "use" => Some(HostApi::Use),
            "jump" => Some(HostApi::Jump),
            "getNearestVoxels" => Some(HostApi::GetNearestVoxels),
            _ => None,
        }
    }

    /// Script-side name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            HostApi::MoveTo => "moveTo",
            HostApi::Use => "use",
            HostApi::Jump => "jump",
            HostApi::GetNearestVoxels => "getNearestVoxels",
        }
    }

    /// Validate evaluated call arguments and shape them into the request
    /// payload forwarded to the game collaborator.
    pub fn build_params(&self, args: Vec<Value>) -> Result<Value> {
        match self {
            HostApi::MoveTo => {
                let [position] = take_args::<1>(self, args)?;
                check_position(self, &position)?;
                Ok(position)
            }
            HostApi::Use => match args.len() {
                0 => Ok(Value::Null),
                1 => {
                    let position = args.into_iter().next().unwrap_or(Value::Null);
                    check_position(self, &position)?;
                    Ok(position)
                }
                found => Err(bad_args(self, &format!("expected 0 or 1 arguments, found {}", found))),
            },
            HostApi::Jump => {
                take_args::<0>(self, args)?;
                Ok(Value::Null)
            }
            HostApi::GetNearestVoxels => {
                let [ids] = take_args::<1>(self, args)?;
                match &ids {
                    Value::List(items) if items.iter().all(|item| matches!(item, Value::Int(_))) => {
                        Ok(ids)
                    }
                    other => Err(bad_args(
                        self,
                        &format!("expected a list of voxel ids, found {}", other.type_name()),
                    )),
                }
            }
        }
    }
}

impl fmt::Display for HostApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A validated host call emitted by the interpreter at a suspension point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCall {
    /// Which host operation the script invoked.
    pub api: HostApi,
    /// Shaped request payload.
    pub params: Value,
}

fn take_args<const N: usize>(api: &HostApi, args: Vec<Value>) -> Result<[Value; N]> {
    let found = args.len();
    <[Value; N]>::try_from(args)
        .map_err(|_| bad_args(api, &format!("expected {} arguments, found {}", N, found)))
}

fn check_position(api: &HostApi, value: &Value) -> Result<()> {
    match value {
        Value::List(items)
            if items.len() == 3 && items.iter().all(|item| item.as_number().is_some()) =>
        {
            Ok(())
        }
        other => Err(bad_args(
            api,
            &format!("expected a [x, y, z] position, found {}", other.type_name()),
        )),
    }
}

fn bad_args(api: &HostApi, detail: &str) -> ScriptError {
    ScriptError::BadArguments {
        api: api.name(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_to_requires_position() {
        let api = HostApi::MoveTo;
        let position = Value::List(vec![Value::Int(3), Value::Int(0), Value::Int(5)]);
        assert_eq!(api.build_params(vec![position.clone()]).unwrap(), position);

        let err = api.build_params(vec![Value::Int(3)]).unwrap_err();
        assert!(matches!(err, ScriptError::BadArguments { api: "moveTo", .. }));
    }

    #[test]
    fn use_position_is_optional() {
        let api = HostApi::Use;
        assert_eq!(api.build_params(Vec::new()).unwrap(), Value::Null);

        let position = Value::List(vec![Value::Int(1), Value::Int(2), Value::Float(3.5)]);
        assert_eq!(api.build_params(vec![position.clone()]).unwrap(), position);
    }

    #[test]
    fn jump_takes_no_arguments() {
        let err = HostApi::Jump.build_params(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ScriptError::BadArguments { api: "jump", .. }));
    }

    #[test]
    fn voxel_query_requires_int_ids() {
        let api = HostApi::GetNearestVoxels;
        let ids = Value::List(vec![Value::Int(5), Value::Int(6)]);
        assert_eq!(api.build_params(vec![ids.clone()]).unwrap(), ids);

        let bad = Value::List(vec![Value::Str("door".into())]);
        assert!(api.build_params(vec![bad]).is_err());
    }

    #[test]
    fn names_round_trip() {
        for api in [
            HostApi::MoveTo,
            HostApi::Use,
            HostApi::Jump,
            HostApi::GetNearestVoxels,
        ] {
            assert_eq!(HostApi::from_name(api.name()), Some(api));
        }
        assert_eq!(HostApi::from_name("teleport"), None);
    }
}
