//! Canonical render state for data views
//!
//! Views never look at raw `loading`/`error`/`data` triples; they call
//! [`derive`] on every render pass and render from the resulting [`UiState`].

use std::collections::{BTreeMap, HashMap, VecDeque};

use contracts::shared::backend_payload::BackendPayload;
use serde_json::Value;

use super::api_error::{classify, ApiFailure, ErrorKind, NormalizedError};

/// Данные, которые могут быть "пустыми" (пустой список и т.п.)
pub trait EmptyData {
    fn is_empty_data(&self) -> bool;
}

impl<T> EmptyData for Vec<T> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl<T> EmptyData for [T] {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl<T> EmptyData for VecDeque<T> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> EmptyData for HashMap<K, V, S> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> EmptyData for BTreeMap<K, V> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> EmptyData for indexmap::IndexMap<K, V, S> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl EmptyData for String {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl EmptyData for Value {
    fn is_empty_data(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl<T: EmptyData> EmptyData for Option<T> {
    fn is_empty_data(&self) -> bool {
        self.as_ref().map_or(true, EmptyData::is_empty_data)
    }
}

impl<T: EmptyData> EmptyData for BackendPayload<T> {
    fn is_empty_data(&self) -> bool {
        match self {
            BackendPayload::Data(data) => data.is_empty_data(),
            BackendPayload::NotSupportedByData(_) => false,
        }
    }
}

/// Error handed to [`derive`]: either still raw, or already classified by the
/// request pipeline. A classified error is never classified again.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSource {
    Raw(ApiFailure),
    Classified(NormalizedError),
}

impl From<ApiFailure> for ErrorSource {
    fn from(failure: ApiFailure) -> Self {
        ErrorSource::Raw(failure)
    }
}

impl From<NormalizedError> for ErrorSource {
    fn from(error: NormalizedError) -> Self {
        ErrorSource::Classified(error)
    }
}

/// One of the five phases a data view can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    /// Offline, or the capability is not supported (by backend or by data)
    Unavailable(ErrorKind),
    Failed(ErrorKind),
    Empty,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<NormalizedError>,
    pub is_empty: bool,
    pub is_offline: bool,
    pub is_not_supported: bool,
    pub is_not_supported_by_data: bool,
}

impl<T> UiState<T> {
    pub fn phase(&self) -> ViewPhase {
        if self.is_loading {
            return ViewPhase::Loading;
        }
        if let Some(error) = &self.error {
            return match error.kind {
                ErrorKind::Offline | ErrorKind::NotSupportedBackend | ErrorKind::NotSupportedByData => {
                    ViewPhase::Unavailable(error.kind)
                }
                kind => ViewPhase::Failed(kind),
            };
        }
        if self.is_empty {
            ViewPhase::Empty
        } else {
            ViewPhase::Ready
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Folds `(data, loading, error)` into a [`UiState`].
///
/// Pure: identical inputs give identical output.
pub fn derive<T: EmptyData>(
    data: Option<T>,
    is_loading: bool,
    raw_error: Option<ErrorSource>,
    endpoint: &str,
) -> UiState<T> {
    let error = raw_error.map(|source| match source {
        ErrorSource::Raw(failure) => classify(&failure, endpoint),
        ErrorSource::Classified(error) => error,
    });

    let kind = error.as_ref().map(|e| e.kind);
    let is_empty = !is_loading && error.is_none() && data.is_empty_data();

    UiState {
        data,
        is_loading,
        is_empty,
        is_offline: kind == Some(ErrorKind::Offline),
        is_not_supported: kind == Some(ErrorKind::NotSupportedBackend),
        is_not_supported_by_data: kind == Some(ErrorKind::NotSupportedByData),
        error,
    }
}

/// Same as [`derive`], for routes answering with a [`BackendPayload`]. The
/// `NOT_SUPPORTED_BY_DATA` variant becomes a `NotSupportedByData` error when
/// no other error is present.
pub fn derive_payload<T: EmptyData>(
    payload: Option<BackendPayload<T>>,
    is_loading: bool,
    raw_error: Option<ErrorSource>,
    endpoint: &str,
) -> UiState<T> {
    match payload {
        Some(BackendPayload::Data(data)) => derive(Some(data), is_loading, raw_error, endpoint),
        Some(BackendPayload::NotSupportedByData(envelope)) => {
            let error = raw_error.unwrap_or_else(|| {
                NormalizedError::not_supported_by_data(endpoint, 200, &envelope).into()
            });
            derive(None, is_loading, Some(error), endpoint)
        }
        None => derive(None, is_loading, raw_error, endpoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::shared::backend_payload::NotSupportedByData;
    use serde_json::json;

    const ENDPOINT: &str = "/api/prodplan/bottlenecks";

    fn flags<T>(state: &UiState<T>) -> [bool; 3] {
        [state.is_offline, state.is_not_supported, state.is_not_supported_by_data]
    }

    #[test]
    fn test_404_scenario() {
        let state = derive(
            None::<Vec<u32>>,
            false,
            Some(ApiFailure::response(404, None).into()),
            ENDPOINT,
        );

        assert!(state.is_not_supported);
        assert!(!state.is_empty);
        assert!(state.data.is_none());
        assert_eq!(state.error_kind(), Some(ErrorKind::NotSupportedBackend));
        assert_eq!(state.phase(), ViewPhase::Unavailable(ErrorKind::NotSupportedBackend));
    }

    #[test]
    fn test_flags_are_exclusive_for_every_kind() {
        let failures = [
            ApiFailure::transport("refused"),
            ApiFailure::response(404, None),
            ApiFailure::response(200, Some(json!({"status": "NOT_SUPPORTED_BY_DATA"}))),
            ApiFailure::response(422, None),
            ApiFailure::response(500, None),
            ApiFailure::response(401, None),
            ApiFailure::response(418, None),
        ];

        for failure in failures {
            let state = derive(None::<Vec<u32>>, false, Some(failure.into()), ENDPOINT);
            let active = flags(&state).iter().filter(|f| **f).count();
            assert!(active <= 1);

            let kind = state.error_kind().unwrap();
            assert_eq!(state.is_offline, kind == ErrorKind::Offline);
            assert_eq!(state.is_not_supported, kind == ErrorKind::NotSupportedBackend);
            assert_eq!(state.is_not_supported_by_data, kind == ErrorKind::NotSupportedByData);
            assert!(!state.is_empty);
        }
    }

    #[test]
    fn test_no_error_means_no_flags() {
        let state = derive(Some(vec![1, 2]), false, None, ENDPOINT);
        assert_eq!(flags(&state), [false; 3]);
        assert!(!state.is_empty);
        assert_eq!(state.phase(), ViewPhase::Ready);
    }

    #[test]
    fn test_empty_only_when_settled_without_error() {
        let empty = derive(Some(Vec::<u32>::new()), false, None, ENDPOINT);
        assert!(empty.is_empty);
        assert_eq!(empty.phase(), ViewPhase::Empty);

        let absent = derive(None::<Vec<u32>>, false, None, ENDPOINT);
        assert!(absent.is_empty);

        let loading = derive(None::<Vec<u32>>, true, None, ENDPOINT);
        assert!(!loading.is_empty);
        assert_eq!(loading.phase(), ViewPhase::Loading);

        let failed = derive(
            Some(Vec::<u32>::new()),
            false,
            Some(ApiFailure::response(500, None).into()),
            ENDPOINT,
        );
        assert!(!failed.is_empty);
        assert_eq!(failed.phase(), ViewPhase::Failed(ErrorKind::ServerError));
    }

    #[test]
    fn test_json_and_object_data() {
        assert!(derive(Some(json!([])), false, None, ENDPOINT).is_empty);
        assert!(derive(Some(Value::Null), false, None, ENDPOINT).is_empty);
        assert!(!derive(Some(json!({"rows": []})), false, None, ENDPOINT).is_empty);
    }

    #[test]
    fn test_classified_error_is_not_reclassified() {
        let mut error = classify(&ApiFailure::response(500, None), "/api/other");
        error.message = "kept as is".into();

        let state = derive(None::<Vec<u32>>, false, Some(error.clone().into()), ENDPOINT);
        assert_eq!(state.error, Some(error));
    }

    #[test]
    fn test_derive_is_stable() {
        let run = || derive(Some(vec![1]), false, Some(ApiFailure::transport("down").into()), ENDPOINT);
        assert_eq!(run(), run());
    }

    #[test]
    fn test_payload_envelope_becomes_not_supported_by_data() {
        let envelope = NotSupportedByData {
            reason: Some("match rate 32%".into()),
            correlation_id: Some("c-1".into()),
            suggestion: None,
            match_rate: Some(0.32),
        };
        let state = derive_payload(
            Some(BackendPayload::<Vec<u32>>::NotSupportedByData(envelope)),
            false,
            None,
            ENDPOINT,
        );

        assert!(state.is_not_supported_by_data);
        assert!(!state.is_empty);
        let error = state.error.unwrap();
        assert_eq!(error.message, "match rate 32%");
        assert_eq!(error.correlation_id.as_deref(), Some("c-1"));
        assert_eq!(error.match_rate, Some(0.32));
    }

    #[test]
    fn test_payload_data_behaves_like_derive() {
        let state = derive_payload(Some(BackendPayload::Data(vec![7])), false, None, ENDPOINT);
        assert_eq!(state.data, Some(vec![7]));
        assert_eq!(state.phase(), ViewPhase::Ready);

        let state = derive_payload(None::<BackendPayload<Vec<u32>>>, true, None, ENDPOINT);
        assert_eq!(state.phase(), ViewPhase::Loading);
    }
}
