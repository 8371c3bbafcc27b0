//! Late-bound `IDispatch` calls.

use crate::ScriptingError;
use std::ptr::null_mut;
use windows::core::{Interface, BSTR, GUID, HSTRING, IUnknown, PCWSTR, VARIANT};
use windows::Win32::System::Com::{
    CreateBindCtx, IDispatch, IMoniker, MkParseDisplayName, DISPATCH_FLAGS, DISPATCH_METHOD,
    DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
};
use windows::Win32::System::Ole::DISPID_PROPERTYPUT;

const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// An automation object addressed by member name.
#[derive(Clone, Debug)]
pub struct Dispatch(IDispatch);

impl Dispatch {
    /// Bind to a running object by display name, like VBScript `GetObject("SAPGUI")`.
    pub fn get_object(display_name: &str) -> Result<Self, ScriptingError> {
        let name = HSTRING::from(display_name);
        unsafe {
            let ctx = CreateBindCtx(0).map_err(|e| {
                ScriptingError::PlatformError(format!("CreateBindCtx failed: {e}"))
            })?;
            let mut eaten = 0u32;
            let mut moniker: Option<IMoniker> = None;
            MkParseDisplayName(&ctx, &name, &mut eaten, &mut moniker).map_err(|e| {
                ScriptingError::ConnectionError(format!("'{display_name}' is not running: {e}"))
            })?;
            let moniker = moniker.ok_or_else(|| {
                ScriptingError::ConnectionError(format!("No moniker for '{display_name}'"))
            })?;
            let object: IDispatch = moniker.BindToObject(&ctx, None::<&IMoniker>).map_err(|e| {
                ScriptingError::ConnectionError(format!(
                    "'{display_name}' is not an automation object: {e}"
                ))
            })?;
            Ok(Self(object))
        }
    }

    fn dispid(&self, member: &str) -> Result<i32, ScriptingError> {
        let wide = HSTRING::from(member);
        let names = [PCWSTR(wide.as_ptr())];
        let mut id = 0i32;
        unsafe {
            self.0
                .GetIDsOfNames(&GUID::zeroed(), names.as_ptr(), 1, LOCALE_USER_DEFAULT, &mut id)
        }
        .map_err(|e| ScriptingError::PlatformError(format!("Unknown member {member}: {e}")))?;
        Ok(id)
    }

    fn invoke(
        &self,
        member: &str,
        flags: DISPATCH_FLAGS,
        mut args: Vec<VARIANT>,
    ) -> Result<VARIANT, ScriptingError> {
        let id = self.dispid(member)?;
        // IDispatch takes arguments right to left.
        args.reverse();
        let is_put = flags == DISPATCH_PROPERTYPUT;
        let mut named = DISPID_PROPERTYPUT;
        let params = DISPPARAMS {
            rgvarg: if args.is_empty() {
                null_mut()
            } else {
                args.as_mut_ptr()
            },
            rgdispidNamedArgs: if is_put { &mut named } else { null_mut() },
            cArgs: args.len() as u32,
            cNamedArgs: if is_put { 1 } else { 0 },
        };
        let mut result = VARIANT::default();
        unsafe {
            self.0.Invoke(
                id,
                &GUID::zeroed(),
                LOCALE_USER_DEFAULT,
                flags,
                &params,
                Some(&mut result as *mut VARIANT),
                None,
                None,
            )
        }
        .map_err(|e| ScriptingError::PlatformError(format!("{member} failed: {e}")))?;
        Ok(result)
    }

    pub fn get(&self, property: &str) -> Result<VARIANT, ScriptingError> {
        self.invoke(property, DISPATCH_PROPERTYGET, Vec::new())
    }

    pub fn put(&self, property: &str, value: VARIANT) -> Result<(), ScriptingError> {
        self.invoke(property, DISPATCH_PROPERTYPUT, vec![value])
            .map(|_| ())
    }

    pub fn call(&self, method: &str, args: Vec<VARIANT>) -> Result<VARIANT, ScriptingError> {
        self.invoke(method, DISPATCH_METHOD | DISPATCH_PROPERTYGET, args)
    }

    pub fn get_string(&self, property: &str) -> Result<String, ScriptingError> {
        variant_to_string(&self.get(property)?)
    }

    pub fn get_i64(&self, property: &str) -> Result<i64, ScriptingError> {
        let value = self.get(property)?;
        i64::try_from(&value)
            .map_err(|e| ScriptingError::PlatformError(format!("{property} is not a number: {e}")))
    }

    pub fn get_dispatch(&self, property: &str) -> Result<Dispatch, ScriptingError> {
        Dispatch::from_variant(&self.get(property)?, property)
    }

    pub fn call_dispatch(&self, method: &str, args: Vec<VARIANT>) -> Result<Dispatch, ScriptingError> {
        Dispatch::from_variant(&self.call(method, args)?, method)
    }

    /// Type gate: the value must be an automation object.
    pub fn from_variant(value: &VARIANT, origin: &str) -> Result<Dispatch, ScriptingError> {
        let unknown = IUnknown::try_from(value).map_err(|e| {
            ScriptingError::ConnectionError(format!("{origin} did not return an object: {e}"))
        })?;
        let dispatch = unknown.cast::<IDispatch>().map_err(|e| {
            ScriptingError::ConnectionError(format!("{origin} is not an IDispatch object: {e}"))
        })?;
        Ok(Dispatch(dispatch))
    }
}

pub fn string_arg(value: &str) -> VARIANT {
    VARIANT::from(BSTR::from(value))
}

pub fn variant_to_string(value: &VARIANT) -> Result<String, ScriptingError> {
    BSTR::try_from(value)
        .map(|s| s.to_string())
        .map_err(|e| ScriptingError::PlatformError(format!("Value is not text: {e}")))
}
